//! Tests for nested transaction semantics.
//!
//! These tests drive a small ledger participant through nested scopes and check
//! that only committed work survives, and that change notifications are
//! coalesced to one per outer commit.

use core::cell::{Cell, RefCell};
use std::rc::Rc;

use machina_transaction::prelude::*;

// ─────────────────────────────────────────────────────────────────────────
// Test Participant
// ─────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Ledger {
    entries: RefCell<Vec<&'static str>>,
    notifications: Cell<u32>,
    snapshots: Snapshots<Vec<&'static str>>,
}

impl Ledger {
    fn record(self: &Rc<Self>, transaction: &Transaction<'_>, entry: &'static str) {
        update_snapshots(self, transaction);
        self.entries.borrow_mut().push(entry);
    }

    fn entries(&self) -> Vec<&'static str> {
        self.entries.borrow().clone()
    }
}

impl SnapshotParticipant for Ledger {
    type Snapshot = Vec<&'static str>;

    fn snapshots(&self) -> &Snapshots<Self::Snapshot> {
        &self.snapshots
    }

    fn create_snapshot(&self) -> Self::Snapshot {
        self.entries()
    }

    fn read_snapshot(&self, snapshot: Self::Snapshot) {
        *self.entries.borrow_mut() = snapshot;
    }

    fn on_final_commit(&self) {
        self.notifications.set(self.notifications.get() + 1);
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn inner_abort_outer_commit() {
    let ledger = Rc::new(Ledger::default());

    let mut outer = Transaction::open_outer();
    ledger.record(&outer, "before");
    {
        let inner = outer.open_nested();
        ledger.record(&inner, "inner");
        inner.abort();
    }
    ledger.record(&outer, "after");
    outer.commit();

    assert_eq!(ledger.entries(), vec!["before", "after"]);
    assert_eq!(ledger.notifications.get(), 1);
}

#[test]
fn deep_nesting_commits_propagate_only_on_outer_commit() {
    let ledger = Rc::new(Ledger::default());

    let mut outer = Transaction::open_outer();
    {
        let mut middle = outer.open_nested();
        {
            let inner = middle.open_nested();
            ledger.record(&inner, "deep");
            inner.commit();
        }
        middle.commit();
    }
    assert_eq!(ledger.notifications.get(), 0, "nested commits stay provisional");
    outer.commit();

    assert_eq!(ledger.entries(), vec!["deep"]);
    assert_eq!(ledger.notifications.get(), 1);
}

#[test]
fn outer_abort_discards_committed_nested_work() {
    let ledger = Rc::new(Ledger::default());

    let mut outer = Transaction::open_outer();
    for entry in ["a", "b", "c"] {
        let inner = outer.open_nested();
        ledger.record(&inner, entry);
        inner.commit();
    }
    drop(outer);

    assert!(ledger.entries().is_empty());
    assert_eq!(ledger.notifications.get(), 0);
}

#[test]
fn test_transaction_pattern_has_no_side_effect() {
    let ledger = Rc::new(Ledger::default());

    let mut outer = Transaction::open_outer();
    let planned = {
        let test = outer.open_nested();
        ledger.record(&test, "planned");
        ledger.entries().len()
    };
    assert_eq!(planned, 1);
    assert!(ledger.entries().is_empty());
    outer.commit();
    assert_eq!(ledger.notifications.get(), 0);
}

#[test]
fn sequential_outer_transactions_notify_once_each() {
    let ledger = Rc::new(Ledger::default());
    for entry in ["x", "y"] {
        let transaction = Transaction::open_outer();
        ledger.record(&transaction, entry);
        ledger.record(&transaction, entry);
        transaction.commit();
    }
    assert_eq!(ledger.entries(), vec!["x", "x", "y", "y"]);
    assert_eq!(ledger.notifications.get(), 2);
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROPERTY TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Random scope trees compared against a plain stack model: every scope
/// either keeps or discards the entries recorded inside it.
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Step {
        Record,
        Scope { commit: bool, body: Vec<Step> },
    }

    fn arb_steps(depth: u32) -> BoxedStrategy<Vec<Step>> {
        let leaf = Just(Step::Record).boxed();
        let step = if depth == 0 {
            leaf
        } else {
            prop_oneof![
                leaf,
                (any::<bool>(), arb_steps(depth - 1))
                    .prop_map(|(commit, body)| Step::Scope { commit, body }),
            ]
            .boxed()
        };
        prop::collection::vec(step, 0..4).boxed()
    }

    fn run(ledger: &Rc<Ledger>, transaction: &mut Transaction<'_>, steps: &[Step]) {
        for step in steps {
            match step {
                Step::Record => ledger.record(transaction, "entry"),
                Step::Scope { commit, body } => {
                    let mut nested = transaction.open_nested();
                    run(ledger, &mut nested, body);
                    if *commit {
                        nested.commit();
                    } else {
                        nested.abort();
                    }
                }
            }
        }
    }

    fn expected(steps: &[Step]) -> usize {
        steps
            .iter()
            .map(|step| match step {
                Step::Record => 1,
                Step::Scope { commit: true, body } => expected(body),
                Step::Scope { commit: false, .. } => 0,
            })
            .sum()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_only_committed_scopes_survive(steps in arb_steps(3), commit in any::<bool>()) {
            let ledger = Rc::new(Ledger::default());
            let mut outer = Transaction::open_outer();
            run(&ledger, &mut outer, &steps);
            if commit {
                outer.commit();
            } else {
                outer.abort();
            }

            let survivors = if commit { expected(&steps) } else { 0 };
            prop_assert_eq!(ledger.entries().len(), survivors);
            prop_assert!(ledger.notifications.get() <= 1);
            prop_assert!(!Transaction::is_open());
        }
    }
}
