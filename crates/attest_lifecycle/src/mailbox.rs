use std::cell::RefCell;
use std::rc::Rc;

use attest_types::CapturedError;
use log::trace;

#[derive(Debug, Default)]
struct Slot {
    current: Option<String>,
    stored: Option<(Option<String>, CapturedError)>,
}

/// Carries the error a test body threw from the runner's failure hook to the
/// status update that follows it.
///
/// The mailbox is shared between the hook and the lifecycle, so cloning it
/// yields another handle to the same slot. A stored error belongs to the
/// test that was current when it was stored and is never handed to another
/// test.
#[derive(Debug, Clone, Default)]
pub struct ExceptionMailbox {
    slot: Rc<RefCell<Slot>>,
}

impl ExceptionMailbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, error: CapturedError) {
        let mut slot = self.slot.borrow_mut();
        trace!("storing {} for {:?}", error.kind, slot.current);
        slot.stored = Some((slot.current.clone(), error));
    }

    pub fn clear(&self) {
        self.slot.borrow_mut().stored = None;
    }

    /// The stored error, if it was stored while `label` was current. The
    /// error stays stored.
    #[must_use]
    pub fn peek_for(&self, label: &str) -> Option<CapturedError> {
        let slot = self.slot.borrow();
        match &slot.stored {
            Some((Some(owner), error)) if owner == label => Some(error.clone()),
            _ => None,
        }
    }

    /// The stored error regardless of its owner.
    #[must_use]
    pub fn last(&self) -> Option<CapturedError> {
        self.slot.borrow().stored.as_ref().map(|(_, error)| error.clone())
    }

    pub(crate) fn enter(&self, label: &str) {
        self.slot.borrow_mut().current = Some(label.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(message: &str) -> CapturedError {
        CapturedError {
            kind: "RuntimeException".into(),
            message: message.into(),
            trace: None,
        }
    }

    #[test]
    fn stored_error_is_visible_to_its_owner() {
        let mailbox = ExceptionMailbox::new();
        mailbox.enter("C::a");
        mailbox.store(error("boom"));

        assert_eq!(mailbox.peek_for("C::a"), Some(error("boom")));
        assert_eq!(mailbox.peek_for("C::a"), Some(error("boom")));
    }

    #[test]
    fn stored_error_is_hidden_from_other_tests() {
        let mailbox = ExceptionMailbox::new();
        mailbox.enter("C::a");
        mailbox.store(error("boom"));
        mailbox.enter("C::b");

        assert_eq!(mailbox.peek_for("C::b"), None);
        assert_eq!(mailbox.last(), Some(error("boom")));
    }

    #[test]
    fn error_stored_before_any_test_has_no_owner() {
        let mailbox = ExceptionMailbox::new();
        mailbox.store(error("early"));
        assert_eq!(mailbox.peek_for(""), None);
        assert!(mailbox.last().is_some());
    }

    #[test]
    fn clones_share_the_slot() {
        let mailbox = ExceptionMailbox::new();
        let hook = mailbox.clone();
        mailbox.enter("C::a");
        hook.store(error("boom"));

        assert!(mailbox.peek_for("C::a").is_some());
        mailbox.clear();
        assert_eq!(hook.last(), None);
    }
}
