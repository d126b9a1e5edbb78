//! Per-slot attribute policies.
//!
//! A policy is pure data: slot index → the one type allowed in that slot,
//! optionally with a nested policy for the children of a nested slot.
//! Slot 0 is reserved in every namespace and is never declared.

use crate::core::attr::{AttrKind, AttrValue, Attribute};
use crate::error::{constants, ProtocolError, Result};

/// Rule for a single slot
#[derive(Debug, Clone, Copy)]
pub struct SlotPolicy {
    pub kind: AttrKind,
    pub nested: Option<&'static Policy>,
}

impl SlotPolicy {
    pub const fn of(kind: AttrKind) -> Self {
        Self { kind, nested: None }
    }

    pub const fn nested(policy: &'static Policy) -> Self {
        Self {
            kind: AttrKind::Nested,
            nested: Some(policy),
        }
    }
}

/// Slot-indexed type contract
#[derive(Debug)]
pub struct Policy {
    name: &'static str,
    slots: &'static [Option<SlotPolicy>],
}

impl Policy {
    /// `slots[i]` describes slot `i`; `slots[0]` must be `None`.
    pub const fn new(name: &'static str, slots: &'static [Option<SlotPolicy>]) -> Self {
        Self { name, slots }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Highest declared slot index
    pub fn max_slot(&self) -> u16 {
        self.slots.len().saturating_sub(1) as u16
    }

    pub fn rule(&self, slot: u16) -> Option<&SlotPolicy> {
        if slot == 0 {
            return None;
        }
        self.slots.get(slot as usize).and_then(Option::as_ref)
    }

    pub fn expected(&self, slot: u16) -> Option<AttrKind> {
        self.rule(slot).map(|rule| rule.kind)
    }

    /// Check a single attribute, recursing into a declared nested policy
    pub fn check(&self, attr: &Attribute) -> Result<()> {
        let rule = self.rule(attr.slot).ok_or(ProtocolError::PolicyViolation {
            slot: attr.slot,
            reason: constants::ERR_SLOT_NOT_IN_POLICY,
        })?;

        if rule.kind != attr.kind() {
            return Err(ProtocolError::PolicyViolation {
                slot: attr.slot,
                reason: constants::ERR_KIND_MISMATCH,
            });
        }

        if let (Some(nested), AttrValue::Nested(children)) = (rule.nested, &attr.value) {
            nested.validate(children)?;
        }
        Ok(())
    }

    /// Check every attribute; the first violation wins
    pub fn validate(&self, attrs: &[Attribute]) -> Result<()> {
        attrs.iter().try_for_each(|attr| self.check(attr))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    static INNER: Policy = Policy::new("inner", &[None, Some(SlotPolicy::of(AttrKind::U16))]);
    static OUTER: Policy = Policy::new(
        "outer",
        &[
            None,
            Some(SlotPolicy::of(AttrKind::Unspec)),
            None,
            Some(SlotPolicy::nested(&INNER)),
        ],
    );

    #[test]
    fn test_max_slot_and_lookup() {
        assert_eq!(OUTER.max_slot(), 3);
        assert_eq!(OUTER.expected(1), Some(AttrKind::Unspec));
        assert_eq!(OUTER.expected(2), None);
        assert_eq!(OUTER.expected(0), None);
        assert_eq!(OUTER.expected(9), None);
        assert_eq!(OUTER.name(), "outer");
    }

    #[test]
    fn test_reserved_and_undeclared_slots_rejected() {
        for slot in [0u16, 2, 4] {
            let err = OUTER.check(&Attribute::marker(slot)).unwrap_err();
            assert!(matches!(err, ProtocolError::PolicyViolation { slot: s, .. } if s == slot));
        }
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let err = OUTER.check(&Attribute::u16(1, 5)).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::PolicyViolation {
                slot: 1,
                reason: constants::ERR_KIND_MISMATCH
            }
        ));
    }

    #[test]
    fn test_nested_policy_applied() {
        let good = Attribute::nested(3, vec![Attribute::u16(1, 2)]);
        assert!(OUTER.check(&good).is_ok());

        let bad = Attribute::nested(3, vec![Attribute::string(1, "2")]);
        assert!(matches!(
            OUTER.check(&bad),
            Err(ProtocolError::PolicyViolation { slot: 1, .. })
        ));
    }
}
