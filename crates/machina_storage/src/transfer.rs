//! Transactional transfers between storages.
//!
//! [`move_resource`] moves one variant with a two-phase protocol:
//!
//! 1. a dry-run scope extracts from the source to find out how much is really
//!    available, then aborts
//! 2. a transfer scope inserts that amount into the destination, extracts
//!    exactly what was accepted from the source, and commits only if the
//!    extraction matched
//!
//! The source is therefore never drained past what the destination can take.
//! [`move_all`] batches the protocol over every variant held by the source.

use machina_transaction::Transaction;

use crate::energy::EnergyStorage;
use crate::group::{SlotGroup, extract_from};
use crate::resource::{Resource, ResourceStack, ResourceVariant};
use crate::slot::{ResourceSlot, TagMatch};

/// Anything resources can be moved in and out of.
///
/// Operations always run inside a transaction, and match tags exactly: the
/// untagged variant never extracts tagged contents.
pub trait Storage<R: Resource> {
    /// Inserts up to `max_amount` of `variant`, returning the amount accepted.
    fn insert_variant(
        &self,
        variant: &ResourceVariant<R>,
        max_amount: u64,
        transaction: &Transaction<'_>,
    ) -> u64;

    /// Extracts up to `max_amount` of `variant`, returning the amount removed.
    fn extract_variant(
        &self,
        variant: &ResourceVariant<R>,
        max_amount: u64,
        transaction: &Transaction<'_>,
    ) -> u64;

    /// Returns the non-empty stacks that may be extracted.
    fn contents(&self) -> Vec<ResourceStack<R>>;

    /// Returns `false` if insertion can never succeed.
    fn supports_insertion(&self) -> bool {
        true
    }

    /// Returns `false` if extraction can never succeed.
    fn supports_extraction(&self) -> bool {
        true
    }
}

impl<R: Resource> Storage<R> for ResourceSlot<R> {
    fn insert_variant(
        &self,
        variant: &ResourceVariant<R>,
        max_amount: u64,
        transaction: &Transaction<'_>,
    ) -> u64 {
        self.insert(variant.resource(), variant.tag(), max_amount, Some(transaction))
    }

    fn extract_variant(
        &self,
        variant: &ResourceVariant<R>,
        max_amount: u64,
        transaction: &Transaction<'_>,
    ) -> u64 {
        self.extract_matching(
            variant.resource(),
            TagMatch::Exact(variant.tag()),
            max_amount,
            Some(transaction),
        )
    }

    fn contents(&self) -> Vec<ResourceStack<R>> {
        let stack = self.stack();
        if stack.is_empty() { Vec::new() } else { vec![stack] }
    }
}

impl<R: Resource> Storage<R> for SlotGroup<R> {
    fn insert_variant(
        &self,
        variant: &ResourceVariant<R>,
        max_amount: u64,
        transaction: &Transaction<'_>,
    ) -> u64 {
        self.insert(variant.resource(), variant.tag(), max_amount, Some(transaction))
    }

    fn extract_variant(
        &self,
        variant: &ResourceVariant<R>,
        max_amount: u64,
        transaction: &Transaction<'_>,
    ) -> u64 {
        extract_from(
            self.iter(),
            variant.resource(),
            TagMatch::Exact(variant.tag()),
            max_amount,
            Some(transaction),
        )
    }

    fn contents(&self) -> Vec<ResourceStack<R>> {
        self.iter()
            .map(ResourceSlot::stack)
            .filter(|stack| !stack.is_empty())
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Moves
// ─────────────────────────────────────────────────────────────────────────────

/// Moves up to `max_amount` of `variant` from `from` to `to`, returning the
/// amount moved.
///
/// With a `context`, the move happens in a nested scope and is undone if the
/// context aborts. Without one, the move opens and commits its own outer
/// transaction.
///
/// # Panics
///
/// Panics if `context` is `None` while an outer transaction is already open.
///
/// # Example
///
/// ```
/// use machina_storage::prelude::*;
///
/// let water = ResourceVariant::of(Fluid::new(Identifier::parse("minecraft:water").unwrap()));
/// let builder = ResourceSlot::<Fluid>::builder().capacity(FLUID_BUCKET);
/// let tank = builder.build().unwrap();
/// let small = ResourceSlot::<Fluid>::builder().capacity(250).build().unwrap();
/// tank.set(water.resource(), None, 1000, None).unwrap();
///
/// assert_eq!(move_resource(&water, &tank, &small, 1000, None), 250);
/// assert_eq!(tank.amount(), 750);
/// assert_eq!(move_resource(&water, &tank, &small, 1000, None), 0);
/// ```
pub fn move_resource<R, F, T>(
    variant: &ResourceVariant<R>,
    from: &F,
    to: &T,
    max_amount: u64,
    mut context: Option<&mut Transaction<'_>>,
) -> u64
where
    R: Resource,
    F: Storage<R> + ?Sized,
    T: Storage<R> + ?Sized,
{
    if max_amount == 0 || !from.supports_extraction() || !to.supports_insertion() {
        return 0;
    }

    let dry_run = Transaction::open(context.as_deref_mut());
    let available = from.extract_variant(variant, max_amount, &dry_run);
    dry_run.abort();
    if available == 0 {
        return 0;
    }

    let transfer = Transaction::open(context.as_deref_mut());
    let accepted = to.insert_variant(variant, available, &transfer);
    if accepted > 0 && from.extract_variant(variant, accepted, &transfer) == accepted {
        transfer.commit();
        tracing::trace!(
            resource = %variant.resource().id(),
            requested = max_amount,
            moved = accepted,
            "moved resource"
        );
        accepted
    } else {
        transfer.abort();
        0
    }
}

/// Moves every variant held by `from` into `to`, up to `max_per_resource` of
/// each, returning the total moved.
///
/// An indexing pass first records how much of each variant the destination
/// accepts when the variants are offered in order; the commit pass then moves
/// exactly those amounts. If any commit move falls short, the whole batch is
/// undone and `0` is returned.
///
/// # Panics
///
/// Panics if `context` is `None` while an outer transaction is already open.
pub fn move_all<R, F, T>(
    from: &F,
    to: &T,
    max_per_resource: u64,
    mut context: Option<&mut Transaction<'_>>,
) -> u64
where
    R: Resource,
    F: Storage<R> + ?Sized,
    T: Storage<R> + ?Sized,
{
    if max_per_resource == 0 || !from.supports_extraction() || !to.supports_insertion() {
        return 0;
    }

    let mut variants: Vec<ResourceVariant<R>> = Vec::new();
    for stack in from.contents() {
        if let Some(variant) = stack.variant()
            && !variants.contains(variant)
        {
            variants.push(variant.clone());
        }
    }
    if variants.is_empty() {
        return 0;
    }

    let mut batch = Transaction::open(context.as_deref_mut());

    let indexing = batch.open_nested();
    let allowances: Vec<(ResourceVariant<R>, u64)> = variants
        .into_iter()
        .filter_map(|variant| {
            let extracted = from.extract_variant(&variant, max_per_resource, &indexing);
            let accepted = to.insert_variant(&variant, extracted, &indexing);
            (accepted > 0).then_some((variant, accepted))
        })
        .collect();
    indexing.abort();

    let mut moved = 0u64;
    for (variant, allowance) in &allowances {
        let actual = move_resource(variant, from, to, *allowance, Some(&mut batch));
        if actual != *allowance {
            tracing::debug!(
                resource = %variant.resource().id(),
                allowance,
                actual,
                "batch move fell short; aborting"
            );
            batch.abort();
            return 0;
        }
        moved += allowance;
    }

    batch.commit();
    moved
}

/// Moves up to `max_amount` of energy from `from` to `to`, with the same
/// two-phase protocol as [`move_resource`].
///
/// # Panics
///
/// Panics if `context` is `None` while an outer transaction is already open.
pub fn move_energy(
    from: &EnergyStorage,
    to: &EnergyStorage,
    max_amount: u64,
    mut context: Option<&mut Transaction<'_>>,
) -> u64 {
    if max_amount == 0 {
        return 0;
    }

    let dry_run = Transaction::open(context.as_deref_mut());
    let available = from.extract(max_amount, Some(&dry_run));
    dry_run.abort();
    if available == 0 {
        return 0;
    }

    let transfer = Transaction::open(context.as_deref_mut());
    let accepted = to.insert(available, Some(&transfer));
    if accepted > 0 && from.extract(accepted, Some(&transfer)) == accepted {
        transfer.commit();
        accepted
    } else {
        transfer.abort();
        0
    }
}
