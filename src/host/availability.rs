//! Bounded-retry resolution of host collaborators
//!
//! A collaborator starts `Pending` when the host has not exposed it yet,
//! is retried on a fixed backoff, and ends `Ready` or `GivenUp` (until the
//! next restart). It is never re-probed once settled.

use crate::core::types::Millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Pending { attempts: u32, next_attempt_at: Millis },
    Ready,
    GivenUp,
}

type Resolver<T> = Box<dyn FnMut() -> Option<T>>;

pub struct Collaborator<T> {
    name: &'static str,
    value: Option<T>,
    resolver: Option<Resolver<T>>,
    state: Availability,
}

impl<T> Collaborator<T> {
    pub fn ready(name: &'static str, value: T) -> Self {
        Self {
            name,
            value: Some(value),
            resolver: None,
            state: Availability::Ready,
        }
    }

    /// Collaborator resolved lazily; the first attempt happens on the first poll
    pub fn resolving(name: &'static str, resolver: impl FnMut() -> Option<T> + 'static) -> Self {
        Self {
            name,
            value: None,
            resolver: Some(Box::new(resolver)),
            state: Availability::Pending {
                attempts: 0,
                next_attempt_at: 0,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> Availability {
        self.state
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.value.as_mut()
    }

    /// Try to resolve if pending and due. Returns the state after the attempt.
    pub fn poll(&mut self, now: Millis, retry_ms: Millis, max_attempts: u32) -> Availability {
        let Availability::Pending {
            attempts,
            next_attempt_at,
        } = self.state
        else {
            return self.state;
        };

        if now < next_attempt_at {
            return self.state;
        }

        let resolved = self.resolver.as_mut().and_then(|resolve| resolve());
        let attempts = attempts + 1;

        self.state = match resolved {
            Some(value) => {
                self.value = Some(value);
                self.resolver = None;
                tracing::info!("{} available after {} attempt(s)", self.name, attempts);
                Availability::Ready
            }
            None if attempts >= max_attempts => {
                self.resolver = None;
                tracing::warn!(
                    "{} still unavailable after {} attempts, giving up until restart",
                    self.name,
                    attempts
                );
                Availability::GivenUp
            }
            None => {
                tracing::debug!("{} not available yet (attempt {})", self.name, attempts);
                Availability::Pending {
                    attempts,
                    next_attempt_at: now + retry_ms,
                }
            }
        };
        self.state
    }
}
