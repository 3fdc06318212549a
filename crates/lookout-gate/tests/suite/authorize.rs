use std::net::IpAddr;

use lookout_gate::{authorize, Decision, DenyReason, IpMask, PasswordHash, SecurityPolicy};
use lookout_proto::{ClientHello, RequestInfo};

fn addr(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn password() -> PasswordHash {
    PasswordHash::derive("correct horse").unwrap()
}

fn authed_hello() -> ClientHello {
    let hash = password();
    ClientHello::new("s1").with_auth("nonce", hash.client_token("nonce"))
}

fn strict_policy() -> SecurityPolicy {
    SecurityPolicy::default()
        .with_password(password())
        .with_ssl_only(true)
        .with_ip_masks(vec!["10.0.*.*".parse::<IpMask>().unwrap()])
}

#[test]
fn open_policy_allows_anyone() {
    let request = RequestInfo::new();
    assert_eq!(
        authorize(&request, None, &SecurityPolicy::default()),
        Decision::Allow
    );
}

#[test]
fn all_checks_pass() {
    let request = RequestInfo::new()
        .with_secure(true)
        .with_remote_addr(addr("10.0.3.4"));
    let hello = authed_hello();
    assert!(authorize(&request, Some(&hello), &strict_policy()).is_allowed());
}

#[test]
fn missing_password_is_denied_even_when_ssl_and_ip_pass() {
    let request = RequestInfo::new()
        .with_secure(true)
        .with_remote_addr(addr("10.0.3.4"));
    let hello = ClientHello::new("s1");
    assert_eq!(
        authorize(&request, Some(&hello), &strict_policy()),
        Decision::Deny(DenyReason::MissingCredentials)
    );
    assert_eq!(
        authorize(&request, None, &strict_policy()),
        Decision::Deny(DenyReason::MissingCredentials)
    );
}

#[test]
fn unencrypted_request_is_denied_even_with_correct_password() {
    let request = RequestInfo::new()
        .with_secure(false)
        .with_remote_addr(addr("10.0.3.4"));
    let hello = authed_hello();
    assert_eq!(
        authorize(&request, Some(&hello), &strict_policy()),
        Decision::Deny(DenyReason::SslRequired)
    );
}

#[test]
fn ip_check_runs_before_password_check() {
    let request = RequestInfo::new()
        .with_secure(true)
        .with_remote_addr(addr("192.168.0.1"));
    assert_eq!(
        authorize(&request, None, &strict_policy()),
        Decision::Deny(DenyReason::IpNotAllowed {
            addr: Some(addr("192.168.0.1"))
        })
    );

    let unknown = RequestInfo::new().with_secure(true);
    assert_eq!(
        authorize(&unknown, None, &strict_policy()),
        Decision::Deny(DenyReason::IpNotAllowed { addr: None })
    );
}

#[test]
fn wrong_token_is_denied() {
    let request = RequestInfo::new()
        .with_secure(true)
        .with_remote_addr(addr("10.0.0.1"));
    let hello = ClientHello::new("s1").with_auth("nonce", "0".repeat(64));
    assert_eq!(
        authorize(&request, Some(&hello), &strict_policy()),
        Decision::Deny(DenyReason::BadCredentials)
    );
}
