//! End-to-end tests: scheduler ticks through the ring buffer to block writes.

mod common;

use common::Pipeline;
use ev_logger::acquisition::accel::{DOUTX, DOUTY, DOUTZ};
use ev_logger::acquisition::AccelState;
use ev_logger::config::StorageConfig;
use ev_logger::data::record::decode_records;
use ev_logger::data::sample::{Axis, SampleSlot};
use ev_logger::hardware::mock::StorageOp;
use ev_logger::logger::status::DEBUG_ROW;
use ev_logger::logger::StepOutcome;

/// 13 analog channels + 3 axes = 32-byte records.
const WIDE: usize = 13;

#[test]
fn test_wide_record_is_32_bytes() {
    assert_eq!(SampleSlot::<WIDE>::RECORD_LEN, 32);
}

#[tokio::test(start_paused = true)]
async fn test_sixteen_ticks_produce_one_block_write() {
    let mut rig = Pipeline::<WIDE>::new(2048, StorageConfig::default());
    rig.consumer.prepare().await;

    rig.state.set_running(true);
    assert_eq!(rig.consumer.step().await, StepOutcome::Opened);

    for _ in 0..15 {
        rig.tick();
    }
    assert_eq!(rig.consumer.step().await, StepOutcome::Waiting);

    rig.tick();
    assert_eq!(rig.consumer.buffer().used(), 512);
    assert_eq!(rig.consumer.step().await, StepOutcome::Wrote(512));
    assert_eq!(rig.consumer.step().await, StepOutcome::Waiting);

    assert_eq!(rig.volume.writes(), vec![512]);
    assert_eq!(
        rig.volume.ops(),
        vec![
            StorageOp::Mount,
            StorageOp::Open("data.log".to_string()),
            StorageOp::Write(512),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_sixty_fifth_record_overflows() {
    let mut rig = Pipeline::<WIDE>::new(2048, StorageConfig::default());
    rig.state.set_running(true);

    for _ in 0..64 {
        rig.tick();
    }
    assert_eq!(rig.consumer.buffer().used(), 2048);
    assert!(!rig.consumer.buffer().is_overflowed());

    rig.tick();
    assert!(rig.consumer.buffer().is_overflowed());
    assert_eq!(rig.consumer.buffer().used(), 2048);

    let stats = rig.scheduler.counters().snapshot();
    assert_eq!(stats.enqueued, 64);
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.ticks, 65);
}

#[tokio::test(start_paused = true)]
async fn test_overflow_is_displayed_and_acknowledged_by_next_session() {
    let mut rig = Pipeline::<WIDE>::new(2048, StorageConfig::default());
    rig.consumer.prepare().await;
    rig.state.set_running(true);

    for _ in 0..70 {
        rig.tick();
    }
    rig.clock.advance(200);
    rig.consumer.poll_status().await;
    assert_eq!(rig.display.row(DEBUG_ROW), "Buffer overflow");

    assert_eq!(rig.consumer.step().await, StepOutcome::Opened);
    assert!(!rig.consumer.buffer().is_overflowed());
    assert_eq!(rig.display.row(DEBUG_ROW), "");
}

#[tokio::test(start_paused = true)]
async fn test_records_carry_previous_cycle_readings() {
    let mut rig = Pipeline::<3>::new(2048, StorageConfig::default());
    rig.consumer.prepare().await;
    rig.state.set_running(true);
    assert_eq!(rig.consumer.step().await, StepOutcome::Opened);

    rig.engine.set_results(&[100, 200, 300]);
    rig.link.set_register(DOUTX, 0x11);
    rig.link.set_register(DOUTY, 0x22);
    rig.link.set_register(DOUTZ, 0x33);

    // Tick 1 hands off the empty boot slot and arms the first acquisition.
    rig.tick();
    rig.engine.set_results(&[101, 201, 301]);
    rig.tick();
    rig.tick();

    rig.state.set_running(false);
    while rig.consumer.step().await != StepOutcome::Closed {}

    let data = rig.volume.file("data.log").unwrap();
    let (records, trailing) = decode_records::<3>(&data);
    assert_eq!(trailing, 0);
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].analog, [0, 0, 0]);
    assert_eq!(records[1].analog, [100, 200, 300]);
    assert_eq!(records[1].accel, [0x11, 0x22, 0x33]);
    assert_eq!(records[2].analog, [101, 201, 301]);

    let stats = rig.scheduler.counters().snapshot();
    assert_eq!(stats.partial_analog, 1);
    assert_eq!(stats.partial_accel, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_accel_exchange_repeats_last_axes() {
    let mut rig = Pipeline::<1>::new(2048, StorageConfig::default());
    rig.consumer.prepare().await;
    rig.state.set_running(true);
    assert_eq!(rig.consumer.step().await, StepOutcome::Opened);

    rig.link.set_register(DOUTX, 1);
    rig.link.set_register(DOUTY, 2);
    rig.link.set_register(DOUTZ, 3);
    rig.tick();
    rig.tick();

    // Next cycle: X arrives, the Y command is refused and the scan is lost.
    rig.link.set_register(DOUTX, 9);
    rig.link.set_register(DOUTY, 8);
    rig.scheduler.on_tick();
    assert!(rig.engine.take_completion().is_some());
    let x = rig.link.take_completion().unwrap();
    rig.link.refuse_next_sends(1);
    rig.scheduler.on_serial_complete(x);
    assert_eq!(rig.scheduler.accel_state(), AccelState::AxisReady(Axis::X));

    rig.tick();
    assert_eq!(rig.scheduler.accel_state(), AccelState::Done);

    rig.state.set_running(false);
    while rig.consumer.step().await != StepOutcome::Closed {}

    let data = rig.volume.file("data.log").unwrap();
    let (records, _) = decode_records::<1>(&data);
    assert_eq!(records.len(), 4);
    assert_eq!(records[2].accel, [1, 2, 3]);
    assert_eq!(records[3].accel, [9, 2, 3]);

    let stats = rig.scheduler.counters().snapshot();
    assert_eq!(stats.partial_accel, 2);
    assert_eq!(stats.partial_analog, 2);
}
