//! Per-connection handshake state.
//!
//! Tracks which stage of the handshake a connection is in, validates
//! that inbound messages are legal for that stage, and owns the lazily
//! created SASL negotiator used while authenticating.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use crate::backend::{Authenticator, ClientInfo, PeerCertificates, SaslNegotiator};
use crate::error::{GatewayError, GatewayResult};

use super::message::{MessageKind, ProtocolVersion};

/// Handshake stage of one connection.
///
/// Stages only ever move forward: `Established` → (`Authenticating` →)
/// `Ready`. `Ready` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionStage {
    Established,
    Authenticating,
    Ready,
}

/// Handshake state owned by one connection.
///
/// The stage is read concurrently by request validation and written only
/// by the path processing the response that drives a transition.
pub struct ConnectionState {
    client: ClientInfo,
    authenticator: Arc<dyn Authenticator>,
    certificates: PeerCertificates,
    stage: RwLock<ConnectionStage>,
    negotiator: Mutex<Option<Box<dyn SaslNegotiator>>>,
}

impl ConnectionState {
    pub fn new(
        client: ClientInfo,
        authenticator: Arc<dyn Authenticator>,
        certificates: PeerCertificates,
    ) -> Self {
        Self {
            client,
            authenticator,
            certificates,
            stage: RwLock::new(ConnectionStage::Established),
            negotiator: Mutex::new(None),
        }
    }

    pub fn client(&self) -> &ClientInfo {
        &self.client
    }

    pub fn stage(&self) -> ConnectionStage {
        *self.stage.read()
    }

    /// Check that a message kind is legal in the current stage.
    pub fn validate_new_message(
        &self,
        kind: MessageKind,
        version: ProtocolVersion,
    ) -> GatewayResult<()> {
        match self.stage() {
            ConnectionStage::Established => {
                if kind != MessageKind::Startup && kind != MessageKind::Options {
                    return Err(GatewayError::Protocol(format!(
                        "Unexpected message {}, expecting STARTUP or OPTIONS",
                        kind
                    )));
                }
            }
            ConnectionStage::Authenticating => {
                // SASL auth from protocol v2 on, the older credentials
                // message for v1.
                if kind != MessageKind::AuthResponse && kind != MessageKind::Credentials {
                    let expected = if version.uses_legacy_credentials() {
                        "CREDENTIALS"
                    } else {
                        "SASL_RESPONSE"
                    };
                    return Err(GatewayError::Protocol(format!(
                        "Unexpected message {}, expecting {}",
                        kind, expected
                    )));
                }
            }
            ConnectionStage::Ready => {
                if kind == MessageKind::Startup {
                    return Err(GatewayError::Protocol(
                        "Unexpected message STARTUP, the connection is already initialized"
                            .to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Advance the stage based on a request and the response produced
    /// for it. `Ready` never transitions away, for any input pair.
    pub fn apply_transition(&self, request: MessageKind, response: MessageKind) {
        let mut stage = self.stage.write();
        match *stage {
            ConnectionStage::Established => {
                if request == MessageKind::Startup {
                    if response == MessageKind::Authenticate {
                        *stage = ConnectionStage::Authenticating;
                    } else if response == MessageKind::Ready {
                        *stage = ConnectionStage::Ready;
                    }
                }
            }
            ConnectionStage::Authenticating => {
                if (request == MessageKind::AuthResponse || request == MessageKind::Credentials)
                    && (response == MessageKind::Ready || response == MessageKind::AuthSuccess)
                {
                    *stage = ConnectionStage::Ready;
                    // The negotiator is never consulted again once the
                    // connection is ready; drop it now.
                    *self.negotiator.lock() = None;
                }
            }
            ConnectionStage::Ready => {}
        }
    }

    /// Run a closure against the connection's SASL negotiator, creating
    /// it on first use.
    ///
    /// The negotiator is built from the backend authenticator plus the
    /// peer identity. An unverified certificate chain is logged and
    /// treated as no certificates.
    pub fn with_sasl_negotiator<R>(
        &self,
        f: impl FnOnce(&mut dyn SaslNegotiator) -> R,
    ) -> R {
        let mut slot = self.negotiator.lock();
        let negotiator = slot.get_or_insert_with(|| {
            let certificates = match &self.certificates {
                PeerCertificates::None => None,
                PeerCertificates::Verified(chain) => Some(chain.clone()),
                PeerCertificates::Unverified(reason) => {
                    tracing::warn!(
                        "Failed to get peer certificates for peer {}: {}",
                        self.client.peer,
                        reason
                    );
                    None
                }
            };
            self.authenticator
                .new_sasl_negotiator(self.client.peer.ip(), certificates)
        });
        f(negotiator.as_mut())
    }

    /// Whether a negotiator instance currently exists.
    pub fn has_negotiator(&self) -> bool {
        self.negotiator.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AuthenticatedUser, BackendError, PeerCertificate};
    use std::net::{IpAddr, SocketAddr};

    use std::sync::atomic::{AtomicBool, Ordering};

    /// Accepts any response; counts how many it has evaluated.
    struct AcceptAllNegotiator {
        calls: u8,
    }

    impl SaslNegotiator for AcceptAllNegotiator {
        fn evaluate_response(
            &mut self,
            _client_response: &[u8],
        ) -> Result<Option<Vec<u8>>, BackendError> {
            self.calls += 1;
            Ok(Some(vec![self.calls]))
        }

        fn is_complete(&self) -> bool {
            true
        }

        fn authenticated_user(&self) -> Result<AuthenticatedUser, BackendError> {
            Ok(AuthenticatedUser::new("anonymous"))
        }
    }

    struct TestAuthenticator {
        saw_certificates: Arc<AtomicBool>,
    }

    impl Authenticator for TestAuthenticator {
        fn new_sasl_negotiator(
            &self,
            _peer: IpAddr,
            certificates: Option<Vec<PeerCertificate>>,
        ) -> Box<dyn SaslNegotiator> {
            self.saw_certificates
                .store(certificates.is_some(), Ordering::SeqCst);
            Box::new(AcceptAllNegotiator { calls: 0 })
        }
    }

    fn new_state(certificates: PeerCertificates) -> (ConnectionState, Arc<AtomicBool>) {
        let saw_certificates = Arc::new(AtomicBool::new(false));
        let peer: SocketAddr = "127.0.0.1:9042".parse().unwrap();
        let state = ConnectionState::new(
            ClientInfo::new(peer),
            Arc::new(TestAuthenticator {
                saw_certificates: saw_certificates.clone(),
            }),
            certificates,
        );
        (state, saw_certificates)
    }

    #[test]
    fn test_established_accepts_only_handshake_initiation() {
        let (state, _) = new_state(PeerCertificates::None);
        for kind in MessageKind::REQUESTS {
            let result = state.validate_new_message(kind, ProtocolVersion::V4);
            if kind == MessageKind::Startup || kind == MessageKind::Options {
                assert!(result.is_ok(), "{} should be legal", kind);
            } else {
                assert!(result.is_err(), "{} should be rejected", kind);
            }
        }
    }

    #[test]
    fn test_authenticating_accepts_only_auth_messages() {
        let (state, _) = new_state(PeerCertificates::None);
        state.apply_transition(MessageKind::Startup, MessageKind::Authenticate);
        assert_eq!(state.stage(), ConnectionStage::Authenticating);

        for kind in MessageKind::REQUESTS {
            let result = state.validate_new_message(kind, ProtocolVersion::V4);
            if kind == MessageKind::AuthResponse || kind == MessageKind::Credentials {
                assert!(result.is_ok(), "{} should be legal", kind);
            } else {
                assert!(result.is_err(), "{} should be rejected", kind);
            }
        }
    }

    #[test]
    fn test_authenticating_error_names_version_specific_expectation() {
        let (state, _) = new_state(PeerCertificates::None);
        state.apply_transition(MessageKind::Startup, MessageKind::Authenticate);

        let err = state
            .validate_new_message(MessageKind::Query, ProtocolVersion::V1)
            .unwrap_err();
        assert!(err.to_string().contains("expecting CREDENTIALS"));

        let err = state
            .validate_new_message(MessageKind::Query, ProtocolVersion::V4)
            .unwrap_err();
        assert!(err.to_string().contains("expecting SASL_RESPONSE"));
    }

    #[test]
    fn test_ready_rejects_only_repeated_startup() {
        let (state, _) = new_state(PeerCertificates::None);
        state.apply_transition(MessageKind::Startup, MessageKind::Ready);
        assert_eq!(state.stage(), ConnectionStage::Ready);

        for kind in MessageKind::REQUESTS {
            let result = state.validate_new_message(kind, ProtocolVersion::V4);
            if kind == MessageKind::Startup {
                assert!(result.is_err());
            } else {
                assert!(result.is_ok(), "{} should be legal once ready", kind);
            }
        }
    }

    #[test]
    fn test_direct_ready_transition_skips_authentication() {
        let (state, _) = new_state(PeerCertificates::None);
        state.apply_transition(MessageKind::Startup, MessageKind::Ready);
        assert_eq!(state.stage(), ConnectionStage::Ready);
    }

    #[test]
    fn test_auth_success_reaches_ready_and_releases_negotiator() {
        let (state, _) = new_state(PeerCertificates::None);
        state.apply_transition(MessageKind::Startup, MessageKind::Authenticate);

        state.with_sasl_negotiator(|negotiator| {
            negotiator.evaluate_response(b"\0user\0secret").unwrap();
        });
        assert!(state.has_negotiator());

        state.apply_transition(MessageKind::AuthResponse, MessageKind::AuthSuccess);
        assert_eq!(state.stage(), ConnectionStage::Ready);
        assert!(!state.has_negotiator());
    }

    #[test]
    fn test_ready_never_regresses() {
        let (state, _) = new_state(PeerCertificates::None);
        state.apply_transition(MessageKind::Startup, MessageKind::Ready);

        for request in MessageKind::REQUESTS {
            for response in [
                MessageKind::Ready,
                MessageKind::Authenticate,
                MessageKind::AuthSuccess,
                MessageKind::Error,
                MessageKind::Result,
            ] {
                state.apply_transition(request, response);
                assert_eq!(state.stage(), ConnectionStage::Ready);
            }
        }
    }

    #[test]
    fn test_unrelated_response_leaves_stage_unchanged() {
        let (state, _) = new_state(PeerCertificates::None);
        state.apply_transition(MessageKind::Startup, MessageKind::Error);
        assert_eq!(state.stage(), ConnectionStage::Established);

        state.apply_transition(MessageKind::Options, MessageKind::Supported);
        assert_eq!(state.stage(), ConnectionStage::Established);
    }

    #[test]
    fn test_negotiator_instance_is_reused() {
        let (state, _) = new_state(PeerCertificates::None);
        let first = state
            .with_sasl_negotiator(|n| n.evaluate_response(b"a").unwrap())
            .unwrap();
        let second = state
            .with_sasl_negotiator(|n| n.evaluate_response(b"b").unwrap())
            .unwrap();
        // The counter carried over, so both calls hit the same instance.
        assert_eq!(first, vec![1]);
        assert_eq!(second, vec![2]);
    }

    #[test]
    fn test_unverified_certificates_are_tolerated() {
        let (state, saw_certificates) =
            new_state(PeerCertificates::Unverified("handshake incomplete".into()));
        let complete = state.with_sasl_negotiator(|negotiator| negotiator.is_complete());
        assert!(complete);
        // The negotiator was created without a chain.
        assert!(!saw_certificates.load(Ordering::SeqCst));
    }

    #[test]
    fn test_verified_certificates_reach_the_negotiator() {
        let (state, saw_certificates) = new_state(PeerCertificates::Verified(vec![
            PeerCertificate(vec![0x30, 0x82]),
        ]));
        state.with_sasl_negotiator(|_| {});
        assert!(saw_certificates.load(Ordering::SeqCst));
    }
}
