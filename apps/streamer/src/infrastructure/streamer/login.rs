//! Login Credential Encoding
//!
//! The LOGIN request authenticates the socket with a URL-encoded credential
//! query string assembled from the session parameters. The server parses it
//! positionally as well as by name, so the key order is fixed and must not
//! change: userid, company, segment, cddomain, token, usergroup,
//! accessLevel, appId, acl, timestamp, authorized.
//!
//! The timestamp is the token issue time converted to epoch milliseconds.

use url::form_urlencoded;

use crate::application::ports::SessionParameters;

/// Protocol version literal sent on LOGIN.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Build the URL-encoded credential string for a LOGIN request.
#[must_use]
pub fn credential_query(session: &SessionParameters) -> String {
    let timestamp = session.token_timestamp.timestamp_millis().to_string();

    form_urlencoded::Serializer::new(String::new())
        .append_pair("userid", &session.account_id)
        .append_pair("company", &session.company)
        .append_pair("segment", &session.segment)
        .append_pair("cddomain", &session.account_cd_domain_id)
        .append_pair("token", &session.token)
        .append_pair("usergroup", &session.user_group)
        .append_pair("accessLevel", &session.access_level)
        .append_pair("appId", &session.app_id)
        .append_pair("acl", &session.acl)
        .append_pair("timestamp", &timestamp)
        .append_pair("authorized", "Y")
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn session() -> SessionParameters {
        SessionParameters {
            streamer_host: "streamer.example.com".to_string(),
            token: "tok+en/1".to_string(),
            token_timestamp: Utc.timestamp_millis_opt(1_620_306_000_123).single().unwrap(),
            user_group: "ACCT".to_string(),
            access_level: "ACCT".to_string(),
            app_id: "TICKTAPE".to_string(),
            acl: "AKQTT~BQ".to_string(),
            account_id: "123456789".to_string(),
            account_cd_domain_id: "A000000012345678".to_string(),
            company: "AMER".to_string(),
            segment: "ADVNCED".to_string(),
        }
    }

    #[test]
    fn keys_appear_in_fixed_order() {
        let query = credential_query(&session());
        let keys: Vec<&str> = query
            .split('&')
            .map(|pair| pair.split('=').next().unwrap())
            .collect();
        assert_eq!(
            keys,
            [
                "userid",
                "company",
                "segment",
                "cddomain",
                "token",
                "usergroup",
                "accessLevel",
                "appId",
                "acl",
                "timestamp",
                "authorized",
            ]
        );
    }

    #[test]
    fn values_are_url_encoded() {
        let query = credential_query(&session());
        // '+' and '/' in the token must not survive unescaped.
        assert!(query.contains("token=tok%2Ben%2F1"));
        assert!(query.contains("acl=AKQTT%7EBQ") || query.contains("acl=AKQTT~BQ"));
    }

    #[test]
    fn timestamp_is_epoch_millis_of_token_issue() {
        let query = credential_query(&session());
        assert!(query.contains("timestamp=1620306000123"));
    }

    #[test]
    fn authorized_flag_is_literal_y() {
        assert!(credential_query(&session()).ends_with("authorized=Y"));
    }
}
