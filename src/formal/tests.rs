// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use proptest::prelude::*;

use super::*;
use crate::core::needle::{Direction, Needle};

fn run(lines: &[&str]) -> (ParsedProgram, Validation) {
    let program = parse_lines(lines);
    assert!(program.errors.is_empty(), "parse errors: {:?}", program.errors);
    let validation = validate(&program.instructions);
    (program, validation)
}

#[test]
fn knit_cycle_validates_cleanly() {
    let (_, v) = run(&["in + f.0 1", "knit - f.0 30 (1,0)", "out - f.0 1"]);
    assert!(v.errors.is_empty(), "{:?}", v.errors);
    assert_eq!(v.trace.len(), 4);
    assert_eq!(v.trace[0], MachineState::new());

    let after_in = &v.trace[1];
    assert_eq!(after_in.carriers.get(&1), Some(&1));
    assert!(after_in.attachments.is_empty());

    let after_knit = &v.trace[2];
    assert_eq!(after_knit.loops.get(&Needle::front(0)), Some(&1));
    assert_eq!(after_knit.carriers.get(&1), Some(&0));
    assert_eq!(
        after_knit.attachments.get(&1),
        Some(&Attachment {
            needle: Needle::front(0),
            direction: Direction::Decreasing,
        })
    );

    let after_out = &v.trace[3];
    assert!(!after_out.carriers.contains_key(&1));
    assert!(!after_out.attachments.contains_key(&1));
    assert_eq!(after_out.loops.get(&Needle::front(0)), Some(&1));
}

#[test]
fn failed_instruction_is_skipped() {
    let (_, v) = run(&["in + f.0 1", "knit + f.0 30 (1,0)", "out + f.0 1"]);
    assert_eq!(v.trace.len(), 3);
    assert_eq!(v.errors.len(), 1);
    assert_eq!(v.errors[0].instruction, 1);
    assert_eq!(v.errors[0].line, 2);
    assert_eq!(
        v.errors[0].error,
        ValidationError::YarnMisplaced {
            yarn: 1,
            expected: 0,
            actual: 1,
        }
    );
    assert_eq!(
        v.errors[0].error.to_string(),
        "Expected yarn 1 at 0, but it is at 1."
    );
    // out was checked against the state left by `in`
    assert!(v.final_state().carriers.is_empty());
    assert!(v.final_state().loops.is_empty());
}

#[test]
fn racking_moves_one_step_at_a_time() {
    let (_, v) = run(&["rack 2"]);
    assert_eq!(v.trace.len(), 1);
    assert_eq!(v.errors[0].error, ValidationError::RackStep { from: 0, to: 2 });
    assert!(v.errors[0].error.to_string().contains("isn't by +/-1"));

    let (_, v) = run(&["rack 1", "rack 0", "rack -1", "rack -1"]);
    assert_eq!(v.trace.len(), 4);
    assert_eq!(v.trace[1].rack, 1);
    assert_eq!(v.trace[2].rack, 0);
    assert_eq!(v.trace[3].rack, -1);
    assert_eq!(v.errors.len(), 1);
    assert_eq!(v.errors[0].instruction, 3);
}

#[test]
fn in_twice_and_unknown_yarn_fail() {
    let (_, v) = run(&["in + f.0 1", "in - f.5 1", "miss + f.1 2"]);
    assert_eq!(v.trace.len(), 2);
    assert_eq!(v.errors[0].error, ValidationError::AlreadyIn(1));
    assert_eq!(v.errors[1].error, ValidationError::YarnNotInAction(2));
}

#[test]
fn miss_walks_carrier_across_needles() {
    let (_, v) = run(&["in - f.5 3", "miss - f.4 3", "miss - f.3 3", "miss + f.3 3"]);
    assert!(v.errors.is_empty(), "{:?}", v.errors);
    assert_eq!(v.trace[1].carriers[&3], 5);
    assert_eq!(v.trace[2].carriers[&3], 4);
    assert_eq!(v.trace[3].carriers[&3], 3);
    assert_eq!(v.trace[4].carriers[&3], 4);
    assert!(v.final_state().attachments.is_empty());
    assert!(v.final_state().loops.is_empty());
}

#[test]
fn out_requires_carrier_on_far_side() {
    let (_, v) = run(&["in + f.0 1", "out - f.0 1", "out + f.0 1"]);
    assert_eq!(v.errors.len(), 1);
    assert_eq!(
        v.errors[0].error,
        ValidationError::YarnMisplaced {
            yarn: 1,
            expected: 0,
            actual: 1,
        }
    );
    assert_eq!(v.trace.len(), 3);
}

#[test]
fn tuck_accumulates_with_special_rule() {
    let (_, v) = run(&[
        "in + f.0 1",
        "tuck - f.0 30 (1,0)",
        "miss + f.0 1",
        "tuck - f.0 30 (1,0)",
    ]);
    assert!(v.errors.is_empty(), "{:?}", v.errors);
    assert_eq!(v.trace[2].loop_count(Needle::front(0)), 1);
    assert_eq!(v.trace[4].loop_count(Needle::front(0)), 2);
}

#[test]
fn knit_replaces_prior_loop_count() {
    let (_, v) = run(&[
        "in + f.0 1",
        "tuck - f.0 30 (1,0)",
        "miss + f.0 1",
        "tuck - f.0 30 (1,0)",
        "miss + f.0 1",
        "knit - f.0 30 (1,1)",
    ]);
    assert!(v.errors.is_empty(), "{:?}", v.errors);
    assert_eq!(v.trace[4].loop_count(Needle::front(0)), 2);
    assert_eq!(v.final_state().loop_count(Needle::front(0)), 1);
}

#[test]
fn drop_needs_a_loop() {
    let (_, v) = run(&["drop f.2", "in + f.1 1", "tuck + f.2 30 (1,1)", "drop f.2"]);
    assert_eq!(v.errors.len(), 1);
    assert_eq!(v.errors[0].error, ValidationError::DropEmpty(Needle::front(2)));
    assert!(v.final_state().loops.is_empty());
    // the yarn stays attached to the dropped needle
    assert_eq!(v.final_state().attachments[&1].needle, Needle::front(2));
}

#[test]
fn xfer_moves_loops_and_attachments() {
    let (_, v) = run(&[
        "in + f.-1 1",
        "tuck + f.0 30 (1,1)",
        "xfer f.0 b.0",
        "rack 1",
        "xfer b.0 f.1",
    ]);
    assert!(v.errors.is_empty(), "{:?}", v.errors);
    assert_eq!(v.trace[3].loop_count(Needle::back(0)), 1);
    assert_eq!(v.trace[3].attachments[&1].needle, Needle::back(0));
    let last = v.final_state();
    assert_eq!(last.loop_count(Needle::front(1)), 1);
    assert_eq!(last.attachments[&1].needle, Needle::front(1));
    assert_eq!(last.attachments[&1].direction, Direction::Increasing);
    // carrier does not follow the loop
    assert_eq!(last.carriers[&1], 1);
}

#[test]
fn xfer_alignment_rules() {
    let (_, v) = run(&["xfer f.0 f.0", "xfer f.0 b.1", "rack 1", "xfer f.1 b.0"]);
    assert_eq!(
        v.errors[0].error,
        ValidationError::SameBed {
            needle: Needle::front(0),
            target: Needle::front(0),
        }
    );
    assert_eq!(
        v.errors[1].error,
        ValidationError::Misaligned {
            needle: Needle::front(0),
            target: Needle::back(1),
            rack: 0,
        }
    );
    assert_eq!(v.errors.len(), 2);
    assert_eq!(v.trace.len(), 3);
}

#[test]
fn split_keeps_new_loop_and_moves_old_one() {
    let (_, v) = run(&[
        "in + f.-1 1",
        "in + f.-1 2",
        "tuck + f.0 30 (1,1)",
        "split + f.0 b.0 30 (2,1)",
    ]);
    assert!(v.errors.is_empty(), "{:?}", v.errors);
    let last = v.final_state();
    assert_eq!(last.loop_count(Needle::front(0)), 1);
    assert_eq!(last.loop_count(Needle::back(0)), 1);
    assert_eq!(last.attachments[&1].needle, Needle::back(0));
    assert_eq!(last.attachments[&2].needle, Needle::front(0));
    assert_eq!(last.carriers[&2], 1);
}

#[test]
fn check_reports_syntax_then_validation_diagnostics() {
    let checked = check("in + f.0 1\nknit + f.0 30\nknit + f.0 30 (1,0)\ndrop f.9\n");
    assert!(!checked.is_clean());
    let diags = checked.diagnostics();
    assert_eq!(diags.len(), 3);
    assert_eq!(diags[0].code(), "fnp001");
    assert_eq!(diags[0].line(), 2);
    assert_eq!(diags[1].code(), "fnv001");
    assert_eq!(diags[1].line(), 3);
    assert_eq!(diags[1].notes()[0], "instruction 1: knit + f.0 30 (1,0)");
    assert_eq!(diags[2].line(), 4);
}

#[test]
fn extreme_literals_fail_without_overflow() {
    let low = format!("rack {}", i64::MIN);
    let high = format!("rack {}", i64::MAX);
    let (_, v) = run(&[low.as_str(), high.as_str()]);
    assert_eq!(v.trace.len(), 1);
    assert_eq!(
        v.errors[0].error,
        ValidationError::RackStep {
            from: 0,
            to: i64::MIN,
        }
    );
    assert_eq!(v.errors.len(), 2);

    let edge = Needle::front(i64::MAX);
    let past_edge = format!("in + {edge} 1");
    let at_edge = format!("in - {edge} 2");
    let (_, v) = run(&[past_edge.as_str(), at_edge.as_str(), "rack 1"]);
    assert_eq!(
        v.errors[0].error,
        ValidationError::OutOfRange {
            needle: edge,
            rack: 0,
        }
    );
    assert!(v.errors[0].error.to_string().contains("out of range"));
    assert_eq!(v.final_state().carriers.get(&2), Some(&i64::MAX));

    let xfer = format!("xfer f.0 b.{}", i64::MAX);
    let (_, v) = run(&["rack 1", xfer.as_str()]);
    assert_eq!(v.trace.len(), 2);
    assert_eq!(
        v.errors[0].error,
        ValidationError::OutOfRange {
            needle: Needle::back(i64::MAX),
            rack: 1,
        }
    );
}

fn needle_token() -> impl Strategy<Value = String> {
    let index = prop_oneof![8 => -3i64..4, 1 => Just(i64::MAX), 1 => Just(i64::MIN)];
    (prop_oneof![Just("f"), Just("b")], index).prop_map(|(bed, idx)| format!("{bed}.{idx}"))
}

fn dir_token() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("+"), Just("-")]
}

fn carrier_line() -> impl Strategy<Value = String> {
    prop_oneof![
        (dir_token(), needle_token(), 1u32..3).prop_map(|(d, n, y)| format!("in {d} {n} {y}")),
        (dir_token(), needle_token(), 1u32..3).prop_map(|(d, n, y)| format!("out {d} {n} {y}")),
        (dir_token(), needle_token(), 1u32..3).prop_map(|(d, n, y)| format!("miss {d} {n} {y}")),
        (dir_token(), needle_token(), 1u32..3)
            .prop_map(|(d, n, y)| format!("knit {d} {n} 30 ({y},1)")),
        (dir_token(), needle_token(), 1u32..3)
            .prop_map(|(d, n, y)| format!("tuck {d} {n} 30 ({y},1)")),
    ]
}

fn program_line() -> impl Strategy<Value = String> {
    prop_oneof![
        carrier_line(),
        (needle_token(), needle_token()).prop_map(|(n, t)| format!("xfer {n} {t}")),
        needle_token().prop_map(|n| format!("drop {n}")),
        (-2i64..3).prop_map(|r| format!("rack {r}")),
        Just(format!("rack {}", i64::MIN)),
        Just(String::new()),
        Just("; comment".to_string()),
        Just("knit + f.0".to_string()),
        Just("wobble".to_string()),
    ]
}

proptest! {
    #[test]
    fn every_line_is_accounted_for(lines in prop::collection::vec(program_line(), 0..40)) {
        let program = parse_lines(&lines);
        let silent = lines
            .iter()
            .filter(|line| line.split(';').next().unwrap_or("").trim().is_empty())
            .count();
        prop_assert_eq!(program.instructions.len() + program.errors.len() + silent, lines.len());
        let mut seen: Vec<usize> = program
            .instructions
            .iter()
            .map(|inst| inst.line)
            .chain(program.errors.iter().map(|err| err.line))
            .collect();
        seen.sort_unstable();
        seen.dedup();
        prop_assert_eq!(seen.len(), program.instructions.len() + program.errors.len());
    }

    #[test]
    fn trace_has_one_state_per_accepted_instruction(
        lines in prop::collection::vec(program_line(), 0..40)
    ) {
        let program = parse_lines(&lines);
        let validation = validate(&program.instructions);
        let mut failed: Vec<usize> = validation.errors.iter().map(|e| e.instruction).collect();
        failed.dedup();
        prop_assert_eq!(
            validation.trace.len(),
            program.instructions.len() - failed.len() + 1
        );
        for state in &validation.trace {
            prop_assert!(state.loops.values().all(|count| *count > 0));
        }
    }
}
