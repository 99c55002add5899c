#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use weft_bytecode::Ret;
use weft_ir::RuleId;

use super::{MemoEntry, MemoKey, MemoMode, MemoTable, UnknownMemoMode};

#[test]
fn default_is_the_precise_mode() {
    assert_eq!(MemoMode::default(), MemoMode::Precise);
}

#[test]
fn parses_from_config_strings() {
    assert_eq!("off".parse(), Ok(MemoMode::Off));
    assert_eq!(" Precise ".parse(), Ok(MemoMode::Precise));
    assert_eq!("AGGRESSIVE".parse(), Ok(MemoMode::Aggressive));
    assert_eq!(
        "fast".parse::<MemoMode>(),
        Err(UnknownMemoMode("fast".to_string()))
    );
    for mode in MemoMode::ALL {
        assert_eq!(mode.to_string().parse(), Ok(mode));
    }
}

#[test]
fn keys_distinguish_masks() {
    let mut table = MemoTable::default();
    let key = MemoKey {
        rule: RuleId::new(1),
        pos: 4,
        mask: 0,
    };
    table.record(
        key,
        MemoEntry::Success {
            end: 6,
            ret: Ret::Int(7),
        },
    );
    table.record(MemoKey { mask: 0b10, ..key }, MemoEntry::Failure);

    assert_eq!(
        table.get(&key),
        Some(&MemoEntry::Success {
            end: 6,
            ret: Ret::Int(7)
        })
    );
    assert_eq!(table.get(&MemoKey { mask: 0b10, ..key }), Some(&MemoEntry::Failure));
    assert_eq!(table.get(&MemoKey { pos: 5, ..key }), None);
    assert_eq!(table.len(), 2);

    table.clear();
    assert_eq!(table.len(), 0);
}
