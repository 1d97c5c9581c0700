//!
//! CAS ticket validation
//! ---------------------
//! The core of the gateway: exchanges a one-time service ticket for verified
//! identity attributes against a CAS server speaking protocol version 1, 2
//! or 3.
//!
//! Responsibilities:
//! - Building the version-specific validation URL (endpoint suffix plus
//!   `service`/`ticket` query parameters, URL-encoded).
//! - Issuing the single outbound GET, bounded by the configured timeout.
//! - Parsing the three incompatible response shapes (v1 plain text, v2/v3
//!   XML) into one normalized `ValidationOutcome`.
//!
//! Anything that is neither a recognized success nor a recognized failure is
//! reported as `Malformed` with the raw body attached, never guessed into a
//! rejection. Tickets are single-use, so nothing here retries.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use tracing::{error, info};

use crate::config::{CasConfig, CasVersion};
use crate::error::GateResult;
use crate::identity::IdentityAttributes;

const CAS_NS: &[u8] = b"http://www.yale.edu/tp/cas";

/// Result of one validation attempt.
///
/// `Rejected` means the CAS server explicitly denied the ticket (trust it,
/// do not retry). `Malformed` is a protocol anomaly, distinct from a
/// credential failure in every layer above. Transport failures surface as
/// `Err(GateError::Transport)` from [`validate`], never as an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Success(IdentityAttributes),
    Rejected,
    Malformed { reason: String, raw: String },
}

/// Validate `ticket` for `service` against the configured CAS server.
///
/// `extra_params` are appended to the validation URL after `service` and
/// `ticket`. Performs exactly one network round trip.
pub async fn validate(
    client: &reqwest::Client,
    config: &CasConfig,
    ticket: &str,
    service: &str,
    extra_params: &[(String, String)],
) -> GateResult<ValidationOutcome> {
    let url = validation_url(config, ticket, service, extra_params)?;
    info!(ticket = %ticket, url = %url, "validating CAS ticket");

    let resp = client.get(url).send().await?;
    let status = resp.status();
    let body = resp.text().await?;

    let outcome = match config.version {
        CasVersion::V1 => parse_v1(&body),
        CasVersion::V2 => parse_service_response(&body, false),
        CasVersion::V3 => parse_service_response(&body, true),
    };
    match &outcome {
        ValidationOutcome::Success(identity) => info!(user = %identity.user, "ticket accepted"),
        ValidationOutcome::Rejected => info!(ticket = %ticket, "ticket rejected"),
        ValidationOutcome::Malformed { reason, .. } => {
            error!(status = %status, reason = %reason, "unrecognized CAS response");
        }
    }
    Ok(outcome)
}

fn validation_url(
    config: &CasConfig,
    ticket: &str,
    service: &str,
    extra_params: &[(String, String)],
) -> GateResult<reqwest::Url> {
    let mut url = config
        .root_url
        .join(config.version.endpoint())
        .map_err(|e| crate::error::GateError::Config(format!("invalid validation URL: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("service", service);
        query.append_pair("ticket", ticket);
        for (key, value) in extra_params {
            query.append_pair(key, value);
        }
    }
    Ok(url)
}

fn malformed(reason: &str, raw: &str) -> ValidationOutcome {
    ValidationOutcome::Malformed { reason: reason.to_string(), raw: raw.to_string() }
}

/// CASv1: two-line plain text. `yes\n<user>` or `no`.
fn parse_v1(body: &str) -> ValidationOutcome {
    let mut lines = body.lines();
    match lines.next() {
        Some("yes") => {
            let user = lines.next().unwrap_or("");
            if user.is_empty() || lines.next().is_some() {
                return malformed("expected exactly 'yes' plus a username line", body);
            }
            ValidationOutcome::Success(IdentityAttributes::from_user(user))
        }
        // The first token is authoritative; trailing lines don't matter
        Some("no") => ValidationOutcome::Rejected,
        _ => malformed("unrecognized first line in CASv1 response", body),
    }
}

fn is_cas(ns: &ResolveResult<'_>) -> bool {
    match ns {
        ResolveResult::Bound(Namespace(n)) => *n == CAS_NS,
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ChildField {
    Name,
    Value,
}

/// One `cas:attribute` element being assembled (encoding form 1). Keeps both
/// the inline `name`/`value` XML attributes and the `cas:name`/`cas:value`
/// child element text until the element closes; inline wins when both forms
/// are populated.
#[derive(Debug, Default)]
struct AttrCapture {
    depth: usize,
    inline_name: Option<String>,
    inline_value: Option<String>,
    child_name: Option<String>,
    child_value: Option<String>,
    capturing: Option<ChildField>,
}

/// Single-pass scan over a v2/v3 `cas:serviceResponse` document.
///
/// Real CAS deployments mix three attribute encodings in one response, so
/// the scan runs two independent extraction passes and merges them in a
/// fixed order (form 1, then form 2, then `user`) — later passes overwrite
/// earlier ones on key collision. The ordering is load-bearing for deployed
/// servers; do not reorder.
struct ResponseScan {
    collect_attributes: bool,
    stack: Vec<(bool, String)>,
    saw_failure: bool,
    failure_at: Option<usize>,
    failure_text: String,
    saw_success: bool,
    success_at: Option<usize>,
    user: Option<String>,
    user_at: Option<usize>,
    captures: Vec<AttrCapture>,
    container_at: Option<usize>,
    form2_open: Option<(usize, String, String)>,
    form1: Vec<(String, String)>,
    form2: Vec<(String, String)>,
}

impl ResponseScan {
    fn new(collect_attributes: bool) -> Self {
        Self {
            collect_attributes,
            stack: Vec::new(),
            saw_failure: false,
            failure_at: None,
            failure_text: String::new(),
            saw_success: false,
            success_at: None,
            user: None,
            user_at: None,
            captures: Vec::new(),
            container_at: None,
            form2_open: None,
            form1: Vec::new(),
            form2: Vec::new(),
        }
    }

    fn enter(&mut self, cas: bool, e: &BytesStart) {
        let local = String::from_utf8_lossy(e.local_name().into_inner()).to_string();
        self.stack.push((cas, local.clone()));
        let depth = self.stack.len();
        let inside_success = self.success_at.is_some();

        if cas && local == "authenticationFailure" {
            // Presence alone is authoritative; the text is only logged
            self.saw_failure = true;
            if self.failure_at.is_none() {
                self.failure_at = Some(depth);
            }
            return;
        }
        if cas && local == "authenticationSuccess" {
            self.saw_success = true;
            if self.success_at.is_none() {
                self.success_at = Some(depth);
            }
            return;
        }
        if !inside_success {
            return;
        }

        if cas && local == "user" && self.user.is_none() && Some(depth) == self.success_at.map(|d| d + 1) {
            self.user = Some(String::new());
            self.user_at = Some(depth);
            return;
        }
        if !self.collect_attributes {
            return;
        }

        // Form 1: any cas:attribute under the success element, at any depth
        if cas && local == "attribute" {
            let mut cap = AttrCapture { depth, ..AttrCapture::default() };
            for attr in e.attributes().flatten() {
                let value = attr.unescape_value().map(|v| v.into_owned()).unwrap_or_default();
                match attr.key.local_name().into_inner() {
                    b"name" => cap.inline_name = Some(value),
                    b"value" => cap.inline_value = Some(value),
                    _ => {}
                }
            }
            self.captures.push(cap);
            return;
        }
        let in_open_capture = self.captures.last().map(|c| c.depth + 1 == depth).unwrap_or(false);
        if cas && in_open_capture && (local == "name" || local == "value") {
            if let Some(cap) = self.captures.last_mut() {
                if local == "name" {
                    cap.capturing = Some(ChildField::Name);
                    cap.child_name.get_or_insert_with(String::new);
                } else {
                    cap.capturing = Some(ChildField::Value);
                    cap.child_value.get_or_insert_with(String::new);
                }
            }
            return;
        }
        if cas && local == "attributes" && self.container_at.is_none() {
            self.container_at = Some(depth);
            return;
        }
        // Form 2: plain named children of the cas:attributes container
        // (cas:attribute children belong to form 1 and were caught above)
        if let Some(container) = self.container_at {
            if depth == container + 1 && self.form2_open.is_none() {
                self.form2_open = Some((depth, local, String::new()));
            }
        }
    }

    fn text(&mut self, txt: &str) {
        let depth = self.stack.len();
        if self.failure_at == Some(depth) {
            self.failure_text.push_str(txt);
            return;
        }
        if self.user_at == Some(depth) {
            if let Some(user) = self.user.as_mut() {
                user.push_str(txt);
            }
            return;
        }
        if let Some(cap) = self.captures.last_mut() {
            if cap.depth + 1 == depth {
                match cap.capturing {
                    Some(ChildField::Name) => {
                        cap.child_name.get_or_insert_with(String::new).push_str(txt);
                        return;
                    }
                    Some(ChildField::Value) => {
                        cap.child_value.get_or_insert_with(String::new).push_str(txt);
                        return;
                    }
                    None => {}
                }
            }
        }
        if let Some((d, _, buf)) = self.form2_open.as_mut() {
            if *d == depth {
                buf.push_str(txt);
            }
        }
    }

    fn leave(&mut self) {
        let depth = self.stack.len();
        if self.failure_at == Some(depth) {
            self.failure_at = None;
        }
        if self.user_at == Some(depth) {
            self.user_at = None;
        }

        let closes_child = self
            .captures
            .last()
            .map(|c| c.capturing.is_some() && c.depth + 1 == depth)
            .unwrap_or(false);
        if closes_child {
            if let Some(cap) = self.captures.last_mut() {
                cap.capturing = None;
            }
        }
        let closes_capture = self.captures.last().map(|c| c.depth == depth).unwrap_or(false);
        if closes_capture {
            if let Some(cap) = self.captures.pop() {
                // Inline name/value attributes win over child elements
                let (key, value) = if cap.inline_name.is_some() && cap.inline_value.is_some() {
                    (cap.inline_name, cap.inline_value)
                } else {
                    (cap.child_name, cap.child_value)
                };
                if let (Some(key), Some(value)) = (key, value) {
                    if !key.is_empty() && !value.is_empty() {
                        self.form1.push((key, value));
                    }
                }
            }
        }
        let closes_form2 = self.form2_open.as_ref().map(|(d, _, _)| *d == depth).unwrap_or(false);
        if closes_form2 {
            if let Some((_, key, value)) = self.form2_open.take() {
                if !key.is_empty() && !value.is_empty() {
                    self.form2.push((key, value));
                }
            }
        }
        if self.container_at == Some(depth) {
            self.container_at = None;
        }
        if self.success_at == Some(depth) {
            self.success_at = None;
        }
        self.stack.pop();
    }

    fn finish(self, body: &str) -> ValidationOutcome {
        if self.saw_failure {
            info!(detail = %self.failure_text.trim(), "CAS reported authentication failure");
            return ValidationOutcome::Rejected;
        }
        if !self.saw_success {
            return malformed("neither authenticationSuccess nor authenticationFailure present", body);
        }
        let user = match self.user {
            Some(user) if !user.is_empty() => user,
            // A success element without a user is a protocol violation,
            // not an empty-attributes case
            _ => return malformed("missing or empty <cas:user> in success response", body),
        };
        let mut attributes = HashMap::new();
        for (key, value) in self.form1 {
            attributes.insert(key, value);
        }
        for (key, value) in self.form2 {
            attributes.insert(key, value);
        }
        ValidationOutcome::Success(IdentityAttributes::with_attributes(user, attributes))
    }
}

/// CASv2/v3: XML `cas:serviceResponse`. With `collect_attributes` the v3
/// attribute encodings are extracted; without it only `cas:user` is read.
fn parse_service_response(body: &str, collect_attributes: bool) -> ValidationOutcome {
    let mut reader = NsReader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut scan = ResponseScan::new(collect_attributes);
    loop {
        match reader.read_resolved_event() {
            Ok((_, Event::Eof)) => break,
            Ok((ns, Event::Start(e))) => scan.enter(is_cas(&ns), &e),
            Ok((ns, Event::Empty(e))) => {
                scan.enter(is_cas(&ns), &e);
                scan.leave();
            }
            Ok((_, Event::Text(t))) => {
                let text = t.unescape().unwrap_or_default();
                scan.text(&text);
            }
            Ok((_, Event::CData(t))) => {
                let text = String::from_utf8_lossy(&t.into_inner()).to_string();
                scan.text(&text);
            }
            Ok((_, Event::End(_))) => scan.leave(),
            Ok(_) => {}
            Err(e) => return malformed(&format!("XML parse error: {e}"), body),
        }
    }
    scan.finish(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CasSetup;
    use crate::tprintln;

    fn success(outcome: ValidationOutcome) -> IdentityAttributes {
        match outcome {
            ValidationOutcome::Success(identity) => identity,
            other => panic!("expected success, got {other:?}"),
        }
    }

    fn attr<'a>(identity: &'a IdentityAttributes, key: &str) -> Option<&'a str> {
        identity.attributes.get(key).map(String::as_str)
    }

    // --- CASv1 ---

    #[test]
    fn v1_yes_two_lines_is_success() {
        let identity = success(parse_v1("yes\nalice"));
        assert_eq!(identity.user, "alice");
        assert_eq!(attr(&identity, "user"), Some("alice"));

        let identity = success(parse_v1("yes\nalice\n"));
        assert_eq!(identity.user, "alice");
    }

    #[test]
    fn v1_no_is_rejected_regardless_of_trailing_lines() {
        assert_eq!(parse_v1("no"), ValidationOutcome::Rejected);
        assert_eq!(parse_v1("no\n"), ValidationOutcome::Rejected);
        assert_eq!(parse_v1("no\nwhatever"), ValidationOutcome::Rejected);
    }

    #[test]
    fn v1_unexpected_shapes_are_malformed() {
        for body in ["", "maybe\nalice", "yes", "yes\n", "yes\nalice\nextra", "YES\nalice"] {
            let outcome = parse_v1(body);
            tprintln!("v1 body {body:?} -> {outcome:?}");
            assert!(
                matches!(outcome, ValidationOutcome::Malformed { .. }),
                "expected malformed for {body:?}, got {outcome:?}"
            );
        }
    }

    #[test]
    fn v1_malformed_carries_raw_body() {
        match parse_v1("unexpected") {
            ValidationOutcome::Malformed { raw, .. } => assert_eq!(raw, "unexpected"),
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    // --- CASv2 ---

    const V2_SUCCESS: &str = r#"<?xml version="1.0"?>
<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
    <cas:authenticationSuccess>
        <cas:user>alice</cas:user>
    </cas:authenticationSuccess>
</cas:serviceResponse>"#;

    const V2_FAILURE: &str = r#"<?xml version="1.0"?>
<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
    <cas:authenticationFailure code="INVALID_TICKET">
        Ticket ST-12345 not recognized
    </cas:authenticationFailure>
</cas:serviceResponse>"#;

    #[test]
    fn v2_success_extracts_user_only() {
        let identity = success(parse_service_response(V2_SUCCESS, false));
        assert_eq!(identity.user, "alice");
        assert_eq!(identity.attributes.len(), 1);
        assert_eq!(attr(&identity, "user"), Some("alice"));
    }

    #[test]
    fn v2_failure_is_rejected() {
        assert_eq!(parse_service_response(V2_FAILURE, false), ValidationOutcome::Rejected);
    }

    #[test]
    fn failure_wins_even_with_success_present() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:authenticationFailure code="INVALID_TICKET"/>
            <cas:authenticationSuccess><cas:user>alice</cas:user></cas:authenticationSuccess>
        </cas:serviceResponse>"#;
        assert_eq!(parse_service_response(body, true), ValidationOutcome::Rejected);
    }

    #[test]
    fn neither_success_nor_failure_is_malformed() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:proxySuccess/>
        </cas:serviceResponse>"#;
        assert!(matches!(parse_service_response(body, false), ValidationOutcome::Malformed { .. }));
    }

    #[test]
    fn invalid_xml_is_malformed_not_transport() {
        let outcome = parse_service_response("<html>CAS is down for maintenance", false);
        match outcome {
            ValidationOutcome::Malformed { raw, .. } => assert!(raw.contains("maintenance")),
            other => panic!("expected malformed, got {other:?}"),
        }
        assert!(matches!(
            parse_service_response("not xml at all", false),
            ValidationOutcome::Malformed { .. }
        ));
    }

    #[test]
    fn foreign_namespace_is_not_recognized() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://example.com/not-cas">
            <cas:authenticationSuccess><cas:user>alice</cas:user></cas:authenticationSuccess>
        </cas:serviceResponse>"#;
        assert!(matches!(parse_service_response(body, false), ValidationOutcome::Malformed { .. }));
    }

    #[test]
    fn success_without_user_is_malformed() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:authenticationSuccess/>
        </cas:serviceResponse>"#;
        assert!(matches!(parse_service_response(body, true), ValidationOutcome::Malformed { .. }));

        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:authenticationSuccess><cas:user></cas:user></cas:authenticationSuccess>
        </cas:serviceResponse>"#;
        assert!(matches!(parse_service_response(body, true), ValidationOutcome::Malformed { .. }));
    }

    // --- CASv3 attribute encodings ---

    #[test]
    fn v3_form1_inline_attributes() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:authenticationSuccess>
                <cas:user>bob</cas:user>
                <cas:attribute name="employeeType" value="staff"/>
                <cas:attribute name="department" value="Physics"/>
            </cas:authenticationSuccess>
        </cas:serviceResponse>"#;
        let identity = success(parse_service_response(body, true));
        assert_eq!(identity.user, "bob");
        assert_eq!(attr(&identity, "employeeType"), Some("staff"));
        assert_eq!(attr(&identity, "department"), Some("Physics"));
    }

    #[test]
    fn v3_form1_child_elements() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:authenticationSuccess>
                <cas:user>bob</cas:user>
                <cas:attribute>
                    <cas:name>department</cas:name>
                    <cas:value>CS</cas:value>
                </cas:attribute>
            </cas:authenticationSuccess>
        </cas:serviceResponse>"#;
        let identity = success(parse_service_response(body, true));
        assert_eq!(attr(&identity, "department"), Some("CS"));
    }

    #[test]
    fn v3_form1_inline_wins_over_child_elements() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:authenticationSuccess>
                <cas:user>bob</cas:user>
                <cas:attribute name="department" value="Physics">
                    <cas:name>department</cas:name>
                    <cas:value>CS</cas:value>
                </cas:attribute>
            </cas:authenticationSuccess>
        </cas:serviceResponse>"#;
        let identity = success(parse_service_response(body, true));
        assert_eq!(attr(&identity, "department"), Some("Physics"));
    }

    #[test]
    fn v3_form2_grouped_container() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:authenticationSuccess>
                <cas:user>alice</cas:user>
                <cas:attributes>
                    <cas:department>CS</cas:department>
                    <cas:employeeType>faculty</cas:employeeType>
                </cas:attributes>
            </cas:authenticationSuccess>
        </cas:serviceResponse>"#;
        let identity = success(parse_service_response(body, true));
        assert_eq!(attr(&identity, "department"), Some("CS"));
        assert_eq!(attr(&identity, "employeeType"), Some("faculty"));
        assert_eq!(attr(&identity, "user"), Some("alice"));
    }

    #[test]
    fn v3_disjoint_forms_merge_to_union() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:authenticationSuccess>
                <cas:user>alice</cas:user>
                <cas:attribute name="employeeType" value="staff"/>
                <cas:attributes>
                    <cas:department>CS</cas:department>
                </cas:attributes>
            </cas:authenticationSuccess>
        </cas:serviceResponse>"#;
        let identity = success(parse_service_response(body, true));
        assert_eq!(attr(&identity, "employeeType"), Some("staff"));
        assert_eq!(attr(&identity, "department"), Some("CS"));
    }

    #[test]
    fn v3_form2_wins_on_key_collision() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:authenticationSuccess>
                <cas:user>alice</cas:user>
                <cas:attribute name="department" value="Physics"/>
                <cas:attributes>
                    <cas:department>CS</cas:department>
                </cas:attributes>
            </cas:authenticationSuccess>
        </cas:serviceResponse>"#;
        let identity = success(parse_service_response(body, true));
        assert_eq!(attr(&identity, "department"), Some("CS"));
    }

    #[test]
    fn v3_attribute_inside_container_is_form1_not_form2() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:authenticationSuccess>
                <cas:user>alice</cas:user>
                <cas:attributes>
                    <cas:attribute name="clearance" value="secret"/>
                    <cas:department>CS</cas:department>
                </cas:attributes>
            </cas:authenticationSuccess>
        </cas:serviceResponse>"#;
        let identity = success(parse_service_response(body, true));
        assert_eq!(attr(&identity, "clearance"), Some("secret"));
        assert_eq!(attr(&identity, "department"), Some("CS"));
        assert_eq!(attr(&identity, "attribute"), None);
    }

    #[test]
    fn v3_empty_keys_and_values_are_skipped() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:authenticationSuccess>
                <cas:user>alice</cas:user>
                <cas:attribute name="blank" value=""/>
                <cas:attribute name="" value="orphan"/>
                <cas:attributes>
                    <cas:emptied></cas:emptied>
                    <cas:kept>yes</cas:kept>
                </cas:attributes>
            </cas:authenticationSuccess>
        </cas:serviceResponse>"#;
        let identity = success(parse_service_response(body, true));
        assert_eq!(attr(&identity, "blank"), None);
        assert_eq!(attr(&identity, "emptied"), None);
        assert_eq!(attr(&identity, "kept"), Some("yes"));
    }

    #[test]
    fn v3_user_key_wins_over_served_attribute() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:authenticationSuccess>
                <cas:user>alice</cas:user>
                <cas:attributes>
                    <cas:user>mallory</cas:user>
                </cas:attributes>
            </cas:authenticationSuccess>
        </cas:serviceResponse>"#;
        let identity = success(parse_service_response(body, true));
        assert_eq!(identity.user, "alice");
        assert_eq!(attr(&identity, "user"), Some("alice"));
    }

    #[test]
    fn v2_mode_ignores_v3_attributes() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:authenticationSuccess>
                <cas:user>alice</cas:user>
                <cas:attributes>
                    <cas:department>CS</cas:department>
                </cas:attributes>
            </cas:authenticationSuccess>
        </cas:serviceResponse>"#;
        let identity = success(parse_service_response(body, false));
        assert_eq!(identity.attributes.len(), 1);
        assert_eq!(attr(&identity, "user"), Some("alice"));
    }

    #[test]
    fn v3_escaped_text_is_unescaped() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:authenticationSuccess>
                <cas:user>alice</cas:user>
                <cas:attributes>
                    <cas:group>R&amp;D &lt;core&gt;</cas:group>
                </cas:attributes>
            </cas:authenticationSuccess>
        </cas:serviceResponse>"#;
        let identity = success(parse_service_response(body, true));
        assert_eq!(attr(&identity, "group"), Some("R&D <core>"));
    }

    // --- URL construction ---

    #[test]
    fn validation_url_per_version_with_encoded_query() {
        let ticket = "ST-1856339-aA5Yuvrxzpv8Tau1cYQ7";
        let service = "https://app.example.com/login?next=/a&b=c";
        for (version, endpoint) in [("1", "validate"), ("2", "serviceValidate"), ("3", "p3/serviceValidate")] {
            let state = CasSetup::new("cas.example.edu", version).host_prefix("cas").build().unwrap();
            let url = validation_url(&state.config, ticket, service, &[]).unwrap();
            assert_eq!(
                url.as_str(),
                format!(
                    "https://cas.example.edu/cas/{endpoint}?service=https%3A%2F%2Fapp.example.com%2Flogin%3Fnext%3D%2Fa%26b%3Dc&ticket={ticket}"
                )
            );
        }
    }

    #[test]
    fn validation_url_appends_extra_params_after_ticket() {
        let state = CasSetup::new("cas.example.edu", "3").build().unwrap();
        let extras = vec![("renew".to_string(), "true".to_string())];
        let url = validation_url(&state.config, "ST-1", "https://app.example.com/login", &extras).unwrap();
        assert!(url.as_str().ends_with("&ticket=ST-1&renew=true"));
    }
}
