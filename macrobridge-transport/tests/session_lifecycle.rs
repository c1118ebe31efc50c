//! Integration tests for the serial session lifecycle.
//!
//! These drive `SerialTransport` through connect / send / failure /
//! reconnect cycles against mock links and decode what reached the wire
//! the way the device firmware would.

use macrobridge_transport::mock::{MockLink, MockOpener};
use macrobridge_transport::{decode_stream, LinkSettings, SerialTransport, TransportError, WireCommand};

fn two_port_transport(a: &MockLink, b: &MockLink) -> SerialTransport {
    let opener = MockOpener::new()
        .with_port("/dev/ttyUSB0", a.clone())
        .with_port("/dev/ttyUSB1", b.clone())
        .with_busy_port("/dev/ttyS0");
    SerialTransport::with_opener(Box::new(opener), LinkSettings::default())
}

#[test]
fn device_sees_saturated_move() {
    let a = MockLink::new();
    let b = MockLink::new();
    let mut transport = two_port_transport(&a, &b);
    transport.connect("/dev/ttyUSB0").unwrap();

    transport.send_move(-5, 5).unwrap();
    transport.send_move(200, -300).unwrap();

    let received = decode_stream(&a.written()).unwrap();
    assert_eq!(
        received,
        vec![
            WireCommand::Move { dx: -5, dy: 5 },
            WireCommand::Move { dx: 127, dy: -128 },
        ]
    );
}

#[test]
fn switching_ports_closes_previous_session() {
    let a = MockLink::new();
    let b = MockLink::new();
    let mut transport = two_port_transport(&a, &b);

    transport.connect("/dev/ttyUSB0").unwrap();
    transport.connect("/dev/ttyUSB1").unwrap();
    transport.send_press(3).unwrap();

    assert!(a.written().is_empty());
    assert_eq!(b.written(), vec![0x02, 0x03]);
    assert_eq!(transport.current_port(), Some("/dev/ttyUSB1"));
}

#[test]
fn busy_port_leaves_transport_disconnected() {
    let a = MockLink::new();
    let b = MockLink::new();
    let mut transport = two_port_transport(&a, &b);
    transport.connect("/dev/ttyUSB0").unwrap();

    let err = transport.connect("/dev/ttyS0").unwrap_err();
    assert!(matches!(err, TransportError::PortBusy(_)));
    assert!(!transport.is_connected());
}

#[test]
fn reconnect_after_failure_opens_fresh_session() {
    let a = MockLink::new();
    let b = MockLink::new();
    let mut transport = two_port_transport(&a, &b);
    transport.connect("/dev/ttyUSB0").unwrap();

    a.fail_writes(true);
    assert!(transport.send_release(1).is_err());
    assert!(!transport.is_connected());

    // Subsequent sends report the missing session rather than retrying
    assert!(matches!(
        transport.send_release(1),
        Err(TransportError::NotConnected)
    ));
    assert_eq!(a.write_calls(), 1);

    a.fail_writes(false);
    transport.connect("/dev/ttyUSB0").unwrap();
    transport.send_release(1).unwrap();
    assert_eq!(a.written(), vec![0x03, 0x01]);
}
