//! Login request construction.

use bytes::BytesMut;

use crate::{
    credentials::{CredentialsError, GcmIdentity},
    ledger::PersistentIdLedger,
    proto::{AUTH_SERVICE_ANDROID_ID, LoginRequest, Setting},
    schema::ProtocolSchema,
};

/// Client identifier presented at login.
pub const CLIENT_ID: &str = "chrome-63.0.3234.0";
/// Login domain.
pub const LOGIN_DOMAIN: &str = "mcs.android.com";

/// Build the login request for `identity`, reporting every id in `ledger`.
///
/// # Errors
///
/// Returns [`CredentialsError::InvalidAndroidId`] if the android id is not
/// decimal.
pub fn login_request(
    identity: &GcmIdentity,
    ledger: &PersistentIdLedger,
) -> Result<LoginRequest, CredentialsError> {
    let hex_id = identity.android_id_hex()?;
    Ok(LoginRequest {
        id: CLIENT_ID.to_owned(),
        domain: LOGIN_DOMAIN.to_owned(),
        user: identity.android_id.clone(),
        resource: identity.android_id.clone(),
        auth_token: identity.security_token.clone(),
        device_id: Some(format!("android-{hex_id}")),
        setting: vec![Setting {
            name: "new_vc".to_owned(),
            value: "1".to_owned(),
        }],
        received_persistent_id: ledger.to_vec(),
        adaptive_heartbeat: Some(false),
        use_rmq2: Some(true),
        auth_service: Some(AUTH_SERVICE_ANDROID_ID),
        network_type: Some(1),
        ..Default::default()
    })
}

/// Encode the opening bytes of a connection: version, login tag, and the
/// length-delimited request.
///
/// # Errors
///
/// See [`login_request`].
pub fn login_frame(
    schema: &ProtocolSchema,
    identity: &GcmIdentity,
    ledger: &PersistentIdLedger,
) -> Result<BytesMut, CredentialsError> {
    Ok(schema.login_frame(&login_request(identity, ledger)?))
}

#[cfg(test)]
mod tests {
    use prost::Message;

    use super::*;
    use crate::tag::{MCS_VERSION, MessageTag};

    fn identity() -> GcmIdentity {
        GcmIdentity {
            android_id: "4096".into(),
            security_token: "token".into(),
        }
    }

    #[test]
    fn request_carries_identity_and_fixed_fields() {
        let ledger = PersistentIdLedger::with_ids(None, ["0:1", "0:2"]);
        let request = login_request(&identity(), &ledger).expect("request");
        assert_eq!(request.id, CLIENT_ID);
        assert_eq!(request.domain, LOGIN_DOMAIN);
        assert_eq!(request.user, "4096");
        assert_eq!(request.resource, "4096");
        assert_eq!(request.auth_token, "token");
        assert_eq!(request.device_id.as_deref(), Some("android-1000"));
        assert_eq!(request.received_persistent_id, ["0:1", "0:2"]);
        assert_eq!(request.auth_service, Some(2));
        assert_eq!(request.use_rmq2, Some(true));
        assert_eq!(request.adaptive_heartbeat, Some(false));
        assert_eq!(request.setting.len(), 1);
    }

    #[test]
    fn frame_is_version_tag_then_delimited_request() {
        let ledger = PersistentIdLedger::new(None);
        let frame = login_frame(&ProtocolSchema::shared(), &identity(), &ledger).expect("frame");
        assert_eq!(frame.first(), Some(&MCS_VERSION));
        assert_eq!(frame.get(1), Some(&MessageTag::LoginRequest.as_u8()));
        let decoded =
            LoginRequest::decode_length_delimited(frame.get(2..).expect("body")).expect("decode");
        assert_eq!(decoded, login_request(&identity(), &ledger).expect("request"));
    }
}
