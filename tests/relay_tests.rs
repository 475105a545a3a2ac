use std::io::Read;
use std::net::TcpListener;
use std::sync::Arc;

use pinmgr::{PinAttributes, PinRegistry, SoftGpio};

fn accept_frame(listener: &TcpListener) -> Vec<u8> {
    let (mut stream, _) = listener.accept().expect("relay connection");
    let mut frame = Vec::new();
    stream.read_to_end(&mut frame).expect("relay frame");
    frame
}

#[test]
fn relay_transmits_fixed_frames_per_level() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener");
    let port = listener.local_addr().unwrap().port();

    let registry = PinRegistry::new(Arc::new(SoftGpio::new()));
    let pin = registry
        .define("mist_valve", &format!("network_relay.0:host=127.0.0.1:port={port}"))
        .unwrap();

    // Configuring the pin drives it to its boot state, which transmits the
    // "off" command.
    pin.set_attr(PinAttributes::OUTPUT).unwrap();
    let off_frame = accept_frame(&listener);
    assert_eq!(&off_frame[..4], &[0x00, 0x00, 0x55, 0xaa]);
    assert_eq!(off_frame[7], 0x02);

    pin.on();
    let on_frame = accept_frame(&listener);
    assert_eq!(on_frame[7], 0x03);
    assert_eq!(on_frame.len(), off_frame.len());

    pin.off();
    let frame = accept_frame(&listener);
    assert_eq!(frame[7], 0x02);

    // Dropping the registry entry stops the worker; the join happens in the
    // backend's teardown and must not hang.
    registry.reset_for_tests();
}

#[test]
fn active_low_relay_inverts_the_command() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener");
    let port = listener.local_addr().unwrap().port();

    let registry = PinRegistry::new(Arc::new(SoftGpio::new()));
    let pin = registry
        .define(
            "mist_valve",
            &format!("network_relay.0:host=127.0.0.1:port={port}:low"),
        )
        .unwrap();

    // Boot state is logical off, which on an active-low relay is the
    // physical "on" command.
    pin.set_attr(PinAttributes::OUTPUT).unwrap();
    let frame = accept_frame(&listener);
    assert_eq!(frame[7], 0x03);

    pin.on();
    let frame = accept_frame(&listener);
    assert_eq!(frame[7], 0x02);

    registry.reset_for_tests();
}

#[test]
fn unassigned_relay_host_fails_configuration() {
    let registry = PinRegistry::new(Arc::new(SoftGpio::new()));
    assert!(registry.define("valve", "network_relay.0:port=6668").is_err());
}
