//! Adapter session against the simulated adapter and instrument

mod common;

use common::{adapter_config, bench, BenchOptions, ESC};
use hp3478a_cal::adapter::protocol::read_nibble_command;
use hp3478a_cal::adapter::{AdapterSession, SessionState};
use hp3478a_cal::calibration::IMAGE_LEN;
use hp3478a_cal::error::CalError;
use hp3478a_cal::transport::{MockTransport, Transport};

#[test]
fn foreign_adapter_is_rejected_without_instrument_traffic() {
    let bench = bench(
        &[0; IMAGE_LEN],
        BenchOptions {
            version: "Agilent 82357B".to_string(),
            ..BenchOptions::default()
        },
    );
    let mut session =
        AdapterSession::new(bench.transport.clone(), &adapter_config(20), 23).unwrap();

    let err = session.connect().unwrap_err();
    assert!(matches!(err, CalError::Configuration(_)));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(bench.transport.writes(), vec![b"++ver\r".to_vec()]);
    assert!(bench.instrument_writes().is_empty());
}

#[test]
fn connect_leaves_adapter_configured() {
    let bench = bench(&[0; IMAGE_LEN], BenchOptions::default());
    let mut session =
        AdapterSession::new(bench.transport.clone(), &adapter_config(50), 17).unwrap();
    session.connect().unwrap();
    assert!(session.is_ready());

    assert!(session.check_response("++addr", "17", false).unwrap());
    assert!(session.check_response("++mode", "1", false).unwrap());
    assert!(session.check_response("++read_tmo_ms", "50", false).unwrap());
}

#[test]
fn status_query_returns_trimmed_line() {
    let bench = bench(&[0; IMAGE_LEN], BenchOptions::default());
    let mut session =
        AdapterSession::new(bench.transport.clone(), &adapter_config(50), 23).unwrap();
    session.connect().unwrap();

    assert_eq!(session.query_instrument("S", true).unwrap(), "0");
}

#[test]
fn absent_instrument_answers_with_empty_string() {
    let bench = bench(
        &[0; IMAGE_LEN],
        BenchOptions {
            status: None,
            ..BenchOptions::default()
        },
    );
    let mut session =
        AdapterSession::new(bench.transport.clone(), &adapter_config(20), 23).unwrap();
    session.connect().unwrap();

    assert_eq!(session.query_instrument("S", true).unwrap(), "");
    assert!(session.is_ready());
}

#[test]
fn nibble_read_returns_offset_value() {
    let mut initial = [0u8; IMAGE_LEN];
    initial[13] = 0x0A;
    let bench = bench(&initial, BenchOptions::default());
    let mut session =
        AdapterSession::new(bench.transport.clone(), &adapter_config(50), 23).unwrap();
    session.connect().unwrap();
    bench.transport.clear_writes();

    // Address 13 is a carriage return and has to travel escaped
    let data = session
        .query_instrument_binary(&read_nibble_command(13), 1)
        .unwrap();
    assert_eq!(data, Some(vec![0x4A]));
    assert_eq!(
        bench.transport.writes(),
        vec![vec![b'W', ESC, 0x0D, b'\r'], b"++read eoi\r".to_vec()]
    );
}

#[test]
fn short_binary_response_is_none() {
    let mock = MockTransport::new().with_responder(|written: &[u8]| {
        let line = String::from_utf8_lossy(written).trim_end().to_string();
        match line.as_str() {
            "++ver" => b"GPIB-USB\r\n".to_vec(),
            "++read eoi" => vec![0x41],
            "++mode" | "++eoi" => b"1\r\n".to_vec(),
            "++auto" | "++eos" | "++eot_enable" => b"0\r\n".to_vec(),
            "++read_tmo_ms" => b"20\r\n".to_vec(),
            "++addr" => b"23\r\n".to_vec(),
            _ => Vec::new(),
        }
    });
    let mut session = AdapterSession::new(mock, &adapter_config(20), 23).unwrap();
    session.connect().unwrap();

    assert_eq!(session.query_instrument_binary(b"QQ", 2).unwrap(), None);
    assert_eq!(
        session.query_instrument_binary(b"QQ", 1).unwrap(),
        Some(vec![0x41])
    );
}

#[test]
fn dropped_session_closes_transport() {
    let bench = bench(&[0; IMAGE_LEN], BenchOptions::default());
    {
        let mut session =
            AdapterSession::new(bench.transport.clone(), &adapter_config(20), 23).unwrap();
        session.connect().unwrap();
    }
    assert!(!bench.transport.is_open());
}
