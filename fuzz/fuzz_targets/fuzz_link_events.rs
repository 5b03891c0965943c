//! Fuzz target: `LinkManager::handle_event`
//!
//! Each input byte becomes one transport event: `0` station started,
//! `1..=2` disconnected, anything else an address ending in that byte.
//! The first byte picks the retry budget.
//!
//! Invariants checked:
//! - The retry counter never exceeds the budget
//! - `Failed` is signalled at most once and is never left
//!
//! cargo fuzz run fuzz_link_events

#![no_main]

use core::net::Ipv4Addr;

use libfuzzer_sys::fuzz_target;
use saltlevel::app::events::LinkEvent;
use saltlevel::app::link::{LinkManager, LinkOutcome, LinkState};
use saltlevel::app::ports::StationPort;
use saltlevel::error::LinkError;

struct NullRadio;

impl StationPort for NullRadio {
    fn start(&mut self) -> Result<(), LinkError> {
        Ok(())
    }

    fn connect(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&budget, events)) = data.split_first() else {
        return;
    };
    let max = budget % 16;
    let link = LinkManager::new(max);
    let mut radio = NullRadio;
    let mut failures = 0u32;
    let mut latched = false;

    for &b in events {
        let event = match b {
            0 => LinkEvent::StationStarted,
            1 | 2 => LinkEvent::StationDisconnected,
            n => LinkEvent::GotAddress(Ipv4Addr::new(192, 168, 1, n)),
        };
        if link.handle_event(event, &mut radio) == Some(LinkOutcome::Failed) {
            failures += 1;
        }
        assert!(link.retry_count() <= max);
        if latched {
            assert_eq!(link.state(), LinkState::Failed);
        }
        latched = link.state() == LinkState::Failed;
    }
    assert!(failures <= 1);
});
