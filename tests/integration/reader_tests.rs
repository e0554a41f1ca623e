//! Retry behaviour of the `RetryingReader` against scripted sensors and a
//! fake sysfs tree.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use envmon::adapters::time::ManualClock;
use envmon::error::ReadError;
use envmon::retry::RetryPolicy;
use envmon::sensors::RetryingReader;
use envmon::sensors::dht::IioHumiture;
use envmon::sensors::ds18b20::W1Thermometer;
use envmon::sensors::gas::{AdcGasSensor, GasCalibration};

use crate::mock_hw::ScriptedHumiture;

fn busy() -> Result<(Option<f64>, Option<f64>), ReadError> {
    Err(ReadError::Transient("checksum mismatch".into()))
}

#[test]
fn succeeds_after_k_transient_failures_with_k_plus_one_reads() {
    for k in 0..3u32 {
        let mut script: Vec<_> = (0..k).map(|_| busy()).collect();
        script.push(Ok((Some(22.5), Some(48.0))));
        let source = ScriptedHumiture::new(script);
        let reads = source.counter();

        let clock = Arc::new(ManualClock::default());
        let mut reader = RetryingReader::builder(
            RetryPolicy::fixed(3, Duration::from_secs(2)),
            clock.clone(),
        )
        .humiture(source)
        .build()
        .unwrap();

        let r = reader.read();
        assert_eq!((r.temperature, r.humidity), (Some(22.5), Some(48.0)));
        assert_eq!(*reads.lock().unwrap(), k + 1);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2); k as usize]);
    }
}

#[test]
fn always_transient_gives_none_after_max_attempts() {
    let source = ScriptedHumiture::new(vec![busy()]);
    let reads = source.counter();
    let clock = Arc::new(ManualClock::default());
    let mut reader = RetryingReader::builder(
        RetryPolicy::fixed(5, Duration::from_millis(200)),
        clock.clone(),
    )
    .humiture(source)
    .build()
    .unwrap();

    let r = reader.read();
    assert_eq!(r.temperature, None);
    assert_eq!(r.humidity, None);
    assert!(!r.has_data());
    assert_eq!(*reads.lock().unwrap(), 5);
    // No sleep after the last attempt.
    assert_eq!(clock.sleeps().len(), 4);
}

#[test]
fn exponential_backoff_between_attempts() {
    let source = ScriptedHumiture::new(vec![busy()]);
    let clock = Arc::new(ManualClock::default());
    let mut reader = RetryingReader::builder(
        RetryPolicy::exponential(4, Duration::from_millis(100), Duration::from_millis(250)),
        clock.clone(),
    )
    .humiture(source)
    .build()
    .unwrap();

    reader.read();
    assert_eq!(
        clock.sleeps(),
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(250),
        ]
    );
}

#[test]
fn full_sysfs_stack() {
    let root = tempfile::tempdir().unwrap();

    let iio = root.path().join("iio:device0");
    fs::create_dir(&iio).unwrap();
    fs::write(iio.join("in_temp_input"), "21000\n").unwrap();
    fs::write(iio.join("in_humidityrelative_input"), "55000\n").unwrap();

    let bus = root.path().join("w1");
    let probe = bus.join("28-00000a1b2c3d");
    fs::create_dir_all(&probe).unwrap();
    fs::write(
        probe.join("w1_slave"),
        "6e 01 4b 46 7f ff 02 10 71 : crc=71 YES\n6e 01 4b 46 7f ff 02 10 71 t=22875\n",
    )
    .unwrap();

    let adc = root.path().join("in0_input");
    fs::write(&adc, "137\n").unwrap();

    let mut reader = RetryingReader::builder(
        RetryPolicy::fixed(2, Duration::from_millis(1)),
        Arc::new(ManualClock::default()),
    )
    .humiture(IioHumiture::open(&iio).unwrap())
    .thermometer(W1Thermometer::discover(&bus).unwrap())
    .gas(AdcGasSensor::open(&adc, GasCalibration::default()).unwrap())
    .build()
    .unwrap();

    let r = reader.read();
    assert_eq!(r.temperature, Some(22.875));
    assert_eq!(r.humidity, Some(55.0));
    let gas = r.gas_ppm.unwrap();
    // (137 - 20) / (255 - 20) * 10000
    assert!((gas - 4978.723).abs() < 0.01, "{gas}");
}

#[test]
fn unparseable_attribute_is_not_retried() {
    let iio = tempfile::tempdir().unwrap();
    fs::write(iio.path().join("in_temp_input"), "23000\n").unwrap();
    fs::write(iio.path().join("in_humidityrelative_input"), "garbage\n").unwrap();

    let clock = Arc::new(ManualClock::default());
    let mut reader = RetryingReader::builder(
        RetryPolicy::fixed(3, Duration::from_secs(1)),
        clock.clone(),
    )
    .humiture(IioHumiture::open(iio.path()).unwrap())
    .build()
    .unwrap();

    let r = reader.read();
    assert_eq!(r.humidity, None);
    assert!(clock.sleeps().is_empty());
}
