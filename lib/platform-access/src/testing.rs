//! In-memory identity service for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use rootcause::Report;

use crate::cookie::{CookieMethods, CookieOptions, CookieToSet};
use crate::error::IdentityError;
use crate::identity::IdentityService;
use crate::session::Session;
use crate::user::User;

pub(crate) const TEST_USER_ID: &str = "5d3c2b1a-0f9e-4d8c-b7a6-958473625140";

pub(crate) fn test_user() -> User {
    User::new(
        TEST_USER_ID.parse().expect("valid id"),
        Some("user@example.com".to_string()),
    )
}

pub(crate) struct FakeIdentity {
    user: Option<User>,
    rotation: Option<(String, String)>,
    unreachable: bool,
    exchange_fails: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeIdentity {
    pub(crate) fn signed_in() -> Self {
        Self {
            user: Some(test_user()),
            rotation: None,
            unreachable: false,
            exchange_fails: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn anonymous() -> Self {
        Self {
            user: None,
            ..Self::signed_in()
        }
    }

    pub(crate) fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::signed_in()
        }
    }

    pub(crate) fn rotating(mut self, name: &str, value: &str) -> Self {
        self.rotation = Some((name.to_string(), value.to_string()));
        self
    }

    pub(crate) fn failing_exchange(mut self) -> Self {
        self.exchange_fails = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().expect("calls lock").push(call.to_string());
    }
}

#[async_trait]
impl IdentityService for FakeIdentity {
    async fn get_user(
        &self,
        cookies: &mut dyn CookieMethods,
    ) -> Result<Option<User>, Report<IdentityError>> {
        self.record("get_user");
        if self.unreachable {
            return Err(IdentityError::Unreachable {
                reason: "connection refused".to_string(),
            }
            .into());
        }
        if let Some((name, value)) = &self.rotation {
            cookies.set_all(vec![CookieToSet::new(
                name,
                value,
                CookieOptions::default(),
            )]);
        }
        Ok(self.user.clone())
    }

    async fn exchange_code_for_session(
        &self,
        code: &str,
        cookies: &mut dyn CookieMethods,
    ) -> Result<Session, Report<IdentityError>> {
        self.record(&format!("exchange:{code}"));
        if self.exchange_fails {
            return Err(IdentityError::Rejected {
                status: 400,
                message: "invalid flow state, no valid flow state found".to_string(),
            }
            .into());
        }
        cookies.set_all(vec![CookieToSet::new(
            "sb-test-auth-token",
            "session",
            CookieOptions::default(),
        )]);
        Ok(Session::new("access".to_string(), "refresh".to_string(), None))
    }

    async fn sign_out(&self, cookies: &mut dyn CookieMethods) -> Result<(), Report<IdentityError>> {
        self.record("sign_out");
        cookies.set_all(vec![CookieToSet::removal("sb-test-auth-token")]);
        Ok(())
    }
}
