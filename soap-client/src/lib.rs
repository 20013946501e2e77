//! Minimal SOAP transport for UPnP control actions
//!
//! Posts one action to a service control URL and hands back the parsed
//! `<ActionResponse>` element. UPnP faults surface as [`SoapError::Fault`]
//! carrying the device's error code.

mod error;

pub use error::SoapError;

use std::time::Duration;
use xmltree::Element;

/// Blocking SOAP client
#[derive(Debug, Clone)]
pub struct SoapClient {
    agent: ureq::Agent,
}

impl SoapClient {
    /// Client with 5 s connect and 10 s read timeouts
    pub fn new() -> Self {
        Self::with_timeouts(Duration::from_secs(5), Duration::from_secs(10))
    }

    pub fn with_timeouts(connect: Duration, read: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(connect)
                .timeout_read(read)
                .build(),
        }
    }

    /// Invoke `action` on the service at `control_url`
    ///
    /// `payload` is the already-escaped argument XML placed inside the
    /// action element.
    pub fn call(
        &self,
        control_url: &str,
        service_uri: &str,
        action: &str,
        payload: &str,
    ) -> Result<Element, SoapError> {
        let body = envelope(service_uri, action, payload);
        let soap_action = format!("\"{}#{}\"", service_uri, action);

        let response = self
            .agent
            .post(control_url)
            .set("Content-Type", "text/xml; charset=\"utf-8\"")
            .set("SOAPACTION", &soap_action)
            .send_string(&body);

        // UPnP devices report faults with HTTP 500 and a SOAP body
        let response = match response {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(e) => return Err(SoapError::Network(e.to_string())),
        };

        let xml_text = response
            .into_string()
            .map_err(|e| SoapError::Network(e.to_string()))?;

        let xml = Element::parse(xml_text.as_bytes()).map_err(|e| SoapError::Parse(e.to_string()))?;

        extract_response(&xml, action)
    }
}

impl Default for SoapClient {
    fn default() -> Self {
        Self::new()
    }
}

fn envelope(service_uri: &str, action: &str, payload: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{action} xmlns:u="{service_uri}">{payload}</u:{action}></s:Body></s:Envelope>"#
    )
}

fn extract_response(xml: &Element, action: &str) -> Result<Element, SoapError> {
    let body = xml
        .get_child("Body")
        .ok_or_else(|| SoapError::Parse("Missing SOAP Body".to_string()))?;

    if let Some(fault) = body.get_child("Fault") {
        let error_code = fault
            .get_child("detail")
            .and_then(|d| d.get_child("UPnPError").or_else(|| d.get_child("UpnPError")))
            .and_then(|e| e.get_child("errorCode"))
            .and_then(|c| c.get_text())
            .and_then(|t| t.trim().parse::<u16>().ok())
            .unwrap_or(500);
        return Err(SoapError::Fault(error_code));
    }

    let response_name = format!("{}Response", action);
    body.get_child(response_name.as_str())
        .cloned()
        .ok_or_else(|| SoapError::Parse(format!("Missing {} element", response_name)))
}

/// Escape text for use inside an XML element or attribute
pub fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Text of a direct child element, empty when absent
pub fn child_text(element: &Element, name: &str) -> String {
    element
        .get_child(name)
        .and_then(|child| child.get_text())
        .map(|text| text.into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_response_with_valid_response() {
        let xml_str = r#"
            <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
                <s:Body>
                    <u:BrowseResponse xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1">
                        <TotalMatches>12</TotalMatches>
                    </u:BrowseResponse>
                </s:Body>
            </s:Envelope>
        "#;

        let xml = Element::parse(xml_str.as_bytes()).unwrap();
        let response = extract_response(&xml, "Browse").unwrap();
        assert_eq!(response.name, "BrowseResponse");
        assert_eq!(child_text(&response, "TotalMatches"), "12");
        assert_eq!(child_text(&response, "Missing"), "");
    }

    #[test]
    fn test_extract_response_with_soap_fault() {
        let xml_str = r#"
            <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
                <s:Body>
                    <s:Fault>
                        <faultcode>s:Client</faultcode>
                        <faultstring>UPnPError</faultstring>
                        <detail>
                            <UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
                                <errorCode>701</errorCode>
                                <errorDescription>No such object</errorDescription>
                            </UPnPError>
                        </detail>
                    </s:Fault>
                </s:Body>
            </s:Envelope>
        "#;

        let xml = Element::parse(xml_str.as_bytes()).unwrap();
        match extract_response(&xml, "Browse").unwrap_err() {
            SoapError::Fault(code) => assert_eq!(code, 701),
            other => panic!("Expected SoapError::Fault, got {other:?}"),
        }
    }

    #[test]
    fn test_soap_fault_with_default_error_code() {
        let xml_str = r#"
            <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
                <s:Body>
                    <s:Fault>
                        <faultcode>s:Server</faultcode>
                        <faultstring>Internal Error</faultstring>
                    </s:Fault>
                </s:Body>
            </s:Envelope>
        "#;

        let xml = Element::parse(xml_str.as_bytes()).unwrap();
        assert!(matches!(
            extract_response(&xml, "Browse"),
            Err(SoapError::Fault(500))
        ));
    }

    #[test]
    fn test_extract_response_missing_parts() {
        let no_body = Element::parse(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"></s:Envelope>"#
                .as_bytes(),
        )
        .unwrap();
        match extract_response(&no_body, "Browse").unwrap_err() {
            SoapError::Parse(msg) => assert!(msg.contains("Missing SOAP Body")),
            other => panic!("Expected SoapError::Parse, got {other:?}"),
        }

        let empty_body = Element::parse(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body/></s:Envelope>"#
                .as_bytes(),
        )
        .unwrap();
        match extract_response(&empty_body, "Browse").unwrap_err() {
            SoapError::Parse(msg) => assert!(msg.contains("Missing BrowseResponse element")),
            other => panic!("Expected SoapError::Parse, got {other:?}"),
        }
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("Tom & Jerry <live>"), "Tom &amp; Jerry &lt;live&gt;");
        assert_eq!(xml_escape(r#"say "hi" 'now'"#), "say &quot;hi&quot; &apos;now&apos;");
        assert_eq!(xml_escape("plain"), "plain");
    }

    #[test]
    fn test_envelope_wraps_payload() {
        let body = envelope(
            "urn:schemas-upnp-org:service:ContentDirectory:1",
            "Browse",
            "<ObjectID>0</ObjectID>",
        );
        let xml = Element::parse(body.as_bytes()).unwrap();
        let action = xml.get_child("Body").unwrap().get_child("Browse").unwrap();
        assert_eq!(child_text(action, "ObjectID"), "0");
    }

    #[test]
    fn test_call_against_server() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/ContentDirectory/control")
            .match_header(
                "SOAPACTION",
                "\"urn:schemas-upnp-org:service:ContentDirectory:1#Browse\"",
            )
            .with_status(200)
            .with_body(
                r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:BrowseResponse xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1"><NumberReturned>0</NumberReturned></u:BrowseResponse></s:Body></s:Envelope>"#,
            )
            .create();

        let client = SoapClient::new();
        let response = client
            .call(
                &format!("{}/ContentDirectory/control", server.url()),
                "urn:schemas-upnp-org:service:ContentDirectory:1",
                "Browse",
                "<ObjectID>0</ObjectID>",
            )
            .unwrap();

        assert_eq!(child_text(&response, "NumberReturned"), "0");
        mock.assert();
    }

    #[test]
    fn test_call_reports_fault_on_http_500() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/control")
            .with_status(500)
            .with_body(
                r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><s:Fault><detail><UPnPError><errorCode>720</errorCode></UPnPError></detail></s:Fault></s:Body></s:Envelope>"#,
            )
            .create();

        let result = SoapClient::new().call(&format!("{}/control", server.url()), "urn:x", "Browse", "");
        assert!(matches!(result, Err(SoapError::Fault(720))));
    }

    #[test]
    fn test_call_unreachable_is_network_error() {
        let client = SoapClient::with_timeouts(Duration::from_millis(200), Duration::from_millis(200));
        let result = client.call("http://127.0.0.1:1/control", "urn:x", "Browse", "");
        assert!(matches!(result, Err(SoapError::Network(_))));
    }
}
