//! Message validation ahead of the handler.

use cmdbus_core::{
    BoxError, Injectable, Message, MessageRef, Middleware, ResultSlot, message_type_name,
};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// A message failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("validation failed: {}", .violations.join("; "))]
pub struct ValidationError {
    violations: Vec<String>,
}

impl ValidationError {
    /// A validation error with a single violation.
    pub fn new(violation: impl Into<String>) -> Self {
        Self {
            violations: vec![violation.into()],
        }
    }

    /// Add another violation.
    pub fn with(mut self, violation: impl Into<String>) -> Self {
        self.violations.push(violation.into());
        self
    }

    /// Every recorded violation.
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    fn merge(&mut self, other: ValidationError) {
        self.violations.extend(other.violations);
    }
}

/// A message that can validate itself.
pub trait Validate {
    /// Check the message, returning every violation found.
    fn validate(&self) -> Result<(), ValidationError>;
}

type Rule = Box<dyn Fn(MessageRef<'_>) -> Result<(), ValidationError> + Send + Sync>;

/// A middleware that rejects invalid messages before they reach the handler.
///
/// Rules are registered per message type. Messages without rules pass
/// through. All rules for a message run, and their violations are reported
/// together as one [`ValidationError`] in the slot.
#[derive(Default)]
pub struct ValidationMiddleware {
    rules: HashMap<&'static str, Vec<Rule>>,
}

impl ValidationMiddleware {
    /// Create a middleware with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule for message type `M`.
    pub fn rule<M, F>(mut self, rule: F) -> Self
    where
        M: Message,
        F: Fn(&M) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        let rule: Rule = Box::new(move |message: MessageRef<'_>| match message.downcast_ref::<M>() {
            Some(message) => rule(message),
            None => Ok(()),
        });
        self.rules.entry(message_type_name::<M>()).or_default().push(rule);
        self
    }

    /// Validate message type `M` with its [`Validate`] implementation.
    pub fn validate<M: Message + Validate>(self) -> Self {
        self.rule::<M, _>(M::validate)
    }

    /// Number of message types with at least one rule.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if no rule is registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn check(&self, message: MessageRef<'_>) -> Result<(), ValidationError> {
        let Some(rules) = self.rules.get(message.type_name()) else {
            return Ok(());
        };

        let mut failure: Option<ValidationError> = None;
        for rule in rules {
            if let Err(err) = rule(message) {
                match failure.as_mut() {
                    Some(failure) => failure.merge(err),
                    None => failure = Some(err),
                }
            }
        }
        failure.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for ValidationMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationMiddleware")
            .field("messages", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Injectable for ValidationMiddleware {}

impl Middleware for ValidationMiddleware {
    fn pre_handle(&self, message: MessageRef<'_>, slot: &mut ResultSlot) -> Result<(), BoxError> {
        if let Err(err) = self.check(message) {
            #[cfg(feature = "tracing")]
            tracing::debug!(message = message.type_name(), %err, "message rejected");
            slot.set_error(err);
        }
        Ok(())
    }

    fn post_handle(&self, _message: MessageRef<'_>, _slot: &mut ResultSlot) -> Result<(), BoxError> {
        Ok(())
    }
}
