//! Boot-time link bring-up with events arriving on a separate dispatcher
//! thread, as they do from the system event loop on the device.

use core::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use saltlevel::app::events::LinkEvent;
use saltlevel::app::link::{LinkManager, LinkState};
use saltlevel::error::LinkError;

use crate::mock_hw::ScriptedStation;

const IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 7);

#[test]
fn connect_blocks_until_address_arrives() {
    let link = Arc::new(LinkManager::new(5));
    let mut sta = ScriptedStation::new(
        link.clone(),
        vec![
            LinkEvent::StationStarted,
            LinkEvent::StationDisconnected,
            LinkEvent::StationDisconnected,
            LinkEvent::GotAddress(IP),
        ],
    );

    assert_eq!(link.connect(&mut sta, Duration::from_secs(5)), Ok(IP));
    assert_eq!(sta.starts, 1);
    assert_eq!(link.state(), LinkState::Connected);
    assert_eq!(link.retry_count(), 0, "address resets the retry counter");
}

#[test]
fn connect_surfaces_retry_exhaustion() {
    let link = Arc::new(LinkManager::new(2));
    let mut script = vec![LinkEvent::StationStarted];
    script.extend(std::iter::repeat_n(LinkEvent::StationDisconnected, 6));
    let mut sta = ScriptedStation::new(link.clone(), script);

    assert_eq!(
        link.connect(&mut sta, Duration::from_secs(5)),
        Err(LinkError::RetryExhausted)
    );
    assert_eq!(link.state(), LinkState::Failed);

    // Later events leave the latch alone.
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(link.state(), LinkState::Failed);
    assert!(link.retry_count() <= 2);
}

#[test]
fn connect_times_out_without_an_outcome() {
    let link = Arc::new(LinkManager::new(5));
    let mut sta = ScriptedStation::new(link.clone(), vec![LinkEvent::StationStarted]);

    let started = Instant::now();
    assert_eq!(
        link.connect(&mut sta, Duration::from_millis(150)),
        Err(LinkError::Timeout)
    );
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert_eq!(link.state(), LinkState::Connecting);
}

#[test]
fn already_connected_link_returns_immediately() {
    let link = Arc::new(LinkManager::new(5));
    let mut sta = ScriptedStation::new(link.clone(), vec![LinkEvent::GotAddress(IP)]);
    assert_eq!(link.connect(&mut sta, Duration::from_secs(5)), Ok(IP));
    assert_eq!(link.connect(&mut sta, Duration::from_secs(5)), Ok(IP));
    assert_eq!(sta.starts, 1);
}

#[test]
fn reset_allows_a_fresh_attempt_after_failure() {
    let link = Arc::new(LinkManager::new(0));
    let mut failing = ScriptedStation::new(
        link.clone(),
        vec![LinkEvent::StationStarted, LinkEvent::StationDisconnected],
    );
    assert_eq!(
        link.connect(&mut failing, Duration::from_secs(5)),
        Err(LinkError::RetryExhausted)
    );

    link.reset();
    let mut healthy = ScriptedStation::new(
        link.clone(),
        vec![LinkEvent::StationStarted, LinkEvent::GotAddress(IP)],
    );
    assert_eq!(link.connect(&mut healthy, Duration::from_secs(5)), Ok(IP));
}
