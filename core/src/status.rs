/*
 * status.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Courier, an HTTP client library.
 *
 * Courier is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Courier is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Courier.  If not, see <http://www.gnu.org/licenses/>.
 */

//! HTTP status codes: reason phrases and conventional lookup names.

/// (code, reason phrase, lookup names).
const STATUS_TABLE: &[(u16, &str, &[&str])] = &[
    (100, "Continue", &["continue"]),
    (101, "Switching Protocols", &["switching_protocols"]),
    (102, "Processing", &["processing"]),
    (103, "Early Hints", &["early_hints"]),
    (200, "OK", &["ok", "okay", "all_ok", "all_okay", "all_good", "\\o/"]),
    (201, "Created", &["created"]),
    (202, "Accepted", &["accepted"]),
    (203, "Non-Authoritative Information", &["non_authoritative_info", "non_authoritative_information"]),
    (204, "No Content", &["no_content"]),
    (205, "Reset Content", &["reset_content", "reset"]),
    (206, "Partial Content", &["partial_content", "partial"]),
    (207, "Multi-Status", &["multi_status", "multiple_status", "multi_stati", "multiple_stati"]),
    (208, "Already Reported", &["already_reported"]),
    (226, "IM Used", &["im_used"]),
    (300, "Multiple Choices", &["multiple_choices"]),
    (301, "Moved Permanently", &["moved_permanently", "moved"]),
    (302, "Found", &["found"]),
    (303, "See Other", &["see_other", "other"]),
    (304, "Not Modified", &["not_modified"]),
    (305, "Use Proxy", &["use_proxy"]),
    (307, "Temporary Redirect", &["temporary_redirect", "temporary_moved", "temporary"]),
    (308, "Permanent Redirect", &["permanent_redirect", "resume_incomplete", "resume"]),
    (400, "Bad Request", &["bad_request", "bad"]),
    (401, "Unauthorized", &["unauthorized"]),
    (402, "Payment Required", &["payment_required", "payment"]),
    (403, "Forbidden", &["forbidden"]),
    (404, "Not Found", &["not_found", "-o-"]),
    (405, "Method Not Allowed", &["method_not_allowed", "not_allowed"]),
    (406, "Not Acceptable", &["not_acceptable"]),
    (407, "Proxy Authentication Required", &["proxy_authentication_required", "proxy_auth", "proxy_authentication"]),
    (408, "Request Timeout", &["request_timeout", "timeout"]),
    (409, "Conflict", &["conflict"]),
    (410, "Gone", &["gone"]),
    (411, "Length Required", &["length_required"]),
    (412, "Precondition Failed", &["precondition_failed", "precondition"]),
    (413, "Payload Too Large", &["request_entity_too_large"]),
    (414, "URI Too Long", &["request_uri_too_large"]),
    (415, "Unsupported Media Type", &["unsupported_media_type", "unsupported_media", "media_type"]),
    (416, "Range Not Satisfiable", &["requested_range_not_satisfiable", "requested_range", "range_not_satisfiable"]),
    (417, "Expectation Failed", &["expectation_failed"]),
    (418, "I'm a teapot", &["im_a_teapot", "teapot", "i_am_a_teapot"]),
    (421, "Misdirected Request", &["misdirected_request"]),
    (422, "Unprocessable Entity", &["unprocessable_entity", "unprocessable"]),
    (423, "Locked", &["locked"]),
    (424, "Failed Dependency", &["failed_dependency", "dependency"]),
    (425, "Too Early", &["unordered_collection", "unordered", "too_early"]),
    (426, "Upgrade Required", &["upgrade_required", "upgrade"]),
    (428, "Precondition Required", &["precondition_required"]),
    (429, "Too Many Requests", &["too_many_requests", "too_many"]),
    (431, "Request Header Fields Too Large", &["header_fields_too_large", "fields_too_large"]),
    (444, "No Response", &["no_response", "none"]),
    (449, "Retry With", &["retry_with", "retry"]),
    (451, "Unavailable For Legal Reasons", &["unavailable_for_legal_reasons", "legal_reasons"]),
    (499, "Client Closed Request", &["client_closed_request"]),
    (500, "Internal Server Error", &["internal_server_error", "server_error", "/o\\"]),
    (501, "Not Implemented", &["not_implemented"]),
    (502, "Bad Gateway", &["bad_gateway"]),
    (503, "Service Unavailable", &["service_unavailable", "unavailable"]),
    (504, "Gateway Timeout", &["gateway_timeout"]),
    (505, "HTTP Version Not Supported", &["http_version_not_supported", "http_version"]),
    (506, "Variant Also Negotiates", &["variant_also_negotiates"]),
    (507, "Insufficient Storage", &["insufficient_storage"]),
    (508, "Loop Detected", &["loop_detected"]),
    (509, "Bandwidth Limit Exceeded", &["bandwidth_limit_exceeded", "bandwidth"]),
    (510, "Not Extended", &["not_extended"]),
    (511, "Network Authentication Required", &["network_authentication_required", "network_auth", "network_authentication"]),
];

/// Standard reason phrase for `code`.
pub fn reason_phrase(code: u16) -> Option<&'static str> {
    STATUS_TABLE
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|(_, reason, _)| *reason)
}

/// Look up a code by one of its names (`"ok"`, `"not_found"`, `"teapot"`...). Case-insensitive.
pub fn lookup(name: &str) -> Option<u16> {
    STATUS_TABLE
        .iter()
        .find(|(_, _, names)| names.iter().any(|n| n.eq_ignore_ascii_case(name)))
        .map(|(code, _, _)| *code)
}

pub fn is_informational(code: u16) -> bool {
    (100..200).contains(&code)
}

pub fn is_redirect(code: u16) -> bool {
    matches!(code, 301 | 302 | 303 | 307 | 308)
}

pub fn is_client_error(code: u16) -> bool {
    (400..500).contains(&code)
}

pub fn is_server_error(code: u16) -> bool {
    (500..600).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_for_known_codes() {
        assert_eq!(reason_phrase(200), Some("OK"));
        assert_eq!(reason_phrase(404), Some("Not Found"));
        assert_eq!(reason_phrase(299), None);
    }

    #[test]
    fn lookup_by_alias() {
        assert_eq!(lookup("ok"), Some(200));
        assert_eq!(lookup("NOT_FOUND"), Some(404));
        assert_eq!(lookup("teapot"), Some(418));
        assert_eq!(lookup("temporary_redirect"), Some(307));
        assert_eq!(lookup("nonsense"), None);
    }

    #[test]
    fn classes() {
        assert!(is_redirect(308));
        assert!(!is_redirect(304));
        assert!(is_client_error(418));
        assert!(is_server_error(503));
        assert!(is_informational(100));
    }
}
