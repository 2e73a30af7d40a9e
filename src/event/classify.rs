use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{OrchestratorError, Result};

use super::extract::generic_resources;
use super::{EventInfo, EventSource, UserIdentity};

/// Normalizes a raw inbound event envelope into an [`EventInfo`].
pub fn classify(raw: &Value) -> Result<EventInfo> {
    let detail_type = raw.get("detail-type").and_then(Value::as_str);
    let Some(detail_type) = detail_type else {
        return Err(OrchestratorError::Malformed(
            "event is missing required field 'detail-type'".to_string(),
        ));
    };

    let source_field = raw.get("source").and_then(Value::as_str).unwrap_or("");
    let detail = raw.get("detail").cloned().unwrap_or(Value::Null);

    let event_source = classify_source(detail_type, source_field, &detail);

    if event_source != EventSource::Unknown && is_empty_detail(&detail) {
        return Err(OrchestratorError::Malformed(format!(
            "event recognised as {event_source:?} but 'detail' is empty"
        )));
    }

    let region = extract_region(raw, &detail);
    let source_account_id = extract_account(raw, &detail);
    let event_time = extract_time(raw);
    let generic = generic_resources(&detail);

    let mut info = EventInfo {
        event_name: String::new(),
        event_source,
        event_time,
        region,
        source_account_id,
        user_identity: None,
        raw_event: raw.clone(),
        generic_resources: generic,
        bucket_name: None,
        instance_id: None,
        group_id: None,
        username: None,
        load_balancer_arn: None,
        listener_arn: None,
        finding_id: None,
        finding_type: None,
        finding_severity: None,
    };

    match event_source {
        EventSource::CloudTrail => extract_cloudtrail(&detail, &mut info),
        EventSource::GuardDuty => extract_guardduty(&detail, &mut info),
        EventSource::SecurityHub => extract_securityhub(detail_type, &mut info),
        EventSource::Config => extract_config(&detail, &mut info),
        EventSource::Unknown => {}
    }

    Ok(info)
}

fn is_empty_detail(detail: &Value) -> bool {
    match detail {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn classify_source(detail_type: &str, source_field: &str, detail: &Value) -> EventSource {
    if detail_type == "AWS API Call via CloudTrail" {
        return EventSource::CloudTrail;
    }
    if source_field == "aws.guardduty" {
        return EventSource::GuardDuty;
    }
    if detail_type == "Security Hub Findings - Imported" {
        return EventSource::SecurityHub;
    }
    if source_field == "aws.config" {
        return EventSource::Config;
    }

    // Structural hints, used when the discriminator fields above didn't
    // match but the shape is still recognisable.
    if detail.get("eventName").is_some() && detail.get("eventSource").is_some() {
        return EventSource::CloudTrail;
    }
    if detail.get("type").is_some() && detail.get("severity").is_some() && detail.get("resource").is_some()
    {
        return EventSource::GuardDuty;
    }
    if detail.get("findings").is_some() {
        return EventSource::SecurityHub;
    }
    if detail.get("resourceType").is_some() || detail.get("configRuleName").is_some() {
        return EventSource::Config;
    }

    EventSource::Unknown
}

/// `extract_account_from_event`: top-level `account`, then
/// `detail.userIdentity.accountId`, then `detail.recipientAccountId`.
fn extract_account(raw: &Value, detail: &Value) -> String {
    raw.get("account")
        .and_then(Value::as_str)
        .or_else(|| {
            detail
                .get("userIdentity")
                .and_then(|u| u.get("accountId"))
                .and_then(Value::as_str)
        })
        .or_else(|| detail.get("recipientAccountId").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

/// `extract_region_from_event`: top-level `region`, then `detail.awsRegion`.
fn extract_region(raw: &Value, detail: &Value) -> String {
    raw.get("region")
        .and_then(Value::as_str)
        .or_else(|| detail.get("awsRegion").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

fn extract_time(raw: &Value) -> DateTime<Utc> {
    raw.get("time")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

fn parse_user_identity(detail: &Value) -> Option<UserIdentity> {
    let ui = detail.get("userIdentity")?;
    Some(UserIdentity {
        principal_id: ui.get("principalId").and_then(Value::as_str).map(String::from),
        user_name: ui.get("userName").and_then(Value::as_str).map(String::from),
        account_id: ui.get("accountId").and_then(Value::as_str).map(String::from),
    })
}

fn extract_cloudtrail(detail: &Value, info: &mut EventInfo) {
    info.event_name = detail
        .get("eventName")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    info.user_identity = parse_user_identity(detail);

    let request = detail.get("requestParameters").unwrap_or(&Value::Null);
    let response = detail.get("responseElements").unwrap_or(&Value::Null);

    info.bucket_name = first_str(&[
        request.get("bucketName"),
        response.get("bucketName"),
    ]);

    info.instance_id = response
        .get("instancesSet")
        .and_then(|s| s.get("items"))
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|item| item.get("instanceId"))
        .and_then(Value::as_str)
        .map(String::from);

    info.group_id = first_str(&[request.get("groupId"), response.get("groupId")]);

    info.load_balancer_arn = first_str(&[
        request.get("loadBalancerArn"),
        response.get("loadBalancerArn"),
    ]);
    info.listener_arn = first_str(&[request.get("listenerArn"), response.get("listenerArn")]);

    if info.load_balancer_arn.is_none() {
        if let Some(listener_arn) = &info.listener_arn {
            info.load_balancer_arn = reconstruct_load_balancer_arn(listener_arn);
        }
    }

    // Reconstructed ARNs don't appear verbatim in the payload, so the generic
    // walk never sees them; feed it back in so the filter builder's ARN
    // search finds it like any other extracted ARN.
    if let Some(arn) = &info.load_balancer_arn {
        info.generic_resources.arns.insert(arn.clone());
    }
}

/// Reconstructs an ALB's load balancer ARN from its listener ARN:
/// `.../listener/app/<name>/<lb-id>/<listener-id>` -> `.../loadbalancer/app/<name>/<lb-id>`.
fn reconstruct_load_balancer_arn(listener_arn: &str) -> Option<String> {
    let (prefix, resource) = listener_arn.rsplit_once(":listener/")?;
    let mut parts = resource.split('/');
    let kind = parts.next()?; // "app" or "net"
    let name = parts.next()?;
    let lb_id = parts.next()?;
    Some(format!("{prefix}:loadbalancer/{kind}/{name}/{lb_id}"))
}

fn first_str(candidates: &[Option<&Value>]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|c| c.and_then(|v| v.as_str()))
        .find(|s| !s.is_empty())
        .map(String::from)
}

fn extract_guardduty(detail: &Value, info: &mut EventInfo) {
    info.finding_type = detail.get("type").and_then(Value::as_str).map(String::from);
    info.finding_id = detail.get("id").and_then(Value::as_str).map(String::from);
    info.finding_severity = detail.get("severity").and_then(Value::as_f64);
    info.event_name = info.finding_type.clone().unwrap_or_default();

    let resource = detail.get("resource").unwrap_or(&Value::Null);
    info.instance_id = resource
        .get("instanceDetails")
        .and_then(|d| d.get("instanceId"))
        .and_then(Value::as_str)
        .map(String::from);
    info.username = resource
        .get("accessKeyDetails")
        .and_then(|d| d.get("userName"))
        .and_then(Value::as_str)
        .map(String::from);
    info.bucket_name = resource
        .get("s3BucketDetails")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .and_then(|b| b.get("name"))
        .and_then(Value::as_str)
        .map(String::from);
}

fn extract_securityhub(detail_type: &str, info: &mut EventInfo) {
    info.event_name = detail_type.to_string();

    let Some(first) = info.primary_finding().cloned() else {
        return;
    };

    info.finding_id = first.get("Id").and_then(Value::as_str).map(String::from);
    info.finding_type = first
        .get("Types")
        .and_then(Value::as_array)
        .and_then(|t| t.first())
        .and_then(Value::as_str)
        .map(String::from);
    info.finding_severity = first
        .get("Severity")
        .and_then(|s| s.get("Normalized"))
        .and_then(Value::as_f64);
}

fn extract_config(detail: &Value, info: &mut EventInfo) {
    info.event_name = detail
        .get("configRuleName")
        .and_then(Value::as_str)
        .or_else(|| detail.get("resourceType").and_then(Value::as_str))
        .unwrap_or("ConfigurationItemChangeNotification")
        .to_string();

    info.instance_id = detail
        .get("resourceType")
        .and_then(Value::as_str)
        .filter(|rt| *rt == "AWS::EC2::Instance")
        .and_then(|_| detail.get("resourceId"))
        .and_then(Value::as_str)
        .map(String::from);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_missing_detail_type() {
        let event = json!({ "source": "aws.config", "detail": {} });
        let err = classify(&event).unwrap_err();
        assert!(format!("{err}").contains("detail-type"));
    }

    #[test]
    fn recognised_source_with_empty_detail_is_malformed() {
        let event = json!({ "detail-type": "AWS API Call via CloudTrail", "detail": {} });
        assert!(classify(&event).is_err());
    }

    #[test]
    fn unknown_shape_is_not_rejected() {
        let event = json!({ "detail-type": "Something Else", "detail": { "foo": "bar" } });
        let info = classify(&event).unwrap();
        assert_eq!(info.event_source, EventSource::Unknown);
        assert!(info.generic_resources.is_empty());
    }

    #[test]
    fn cloudtrail_run_instances_extracts_instance_id() {
        let event = json!({
            "detail-type": "AWS API Call via CloudTrail",
            "account": "111111111111",
            "region": "us-east-1",
            "time": "2026-01-01T00:00:00Z",
            "detail": {
                "eventName": "RunInstances",
                "eventSource": "ec2.amazonaws.com",
                "userIdentity": { "userName": "alice", "principalId": "AID123" },
                "responseElements": {
                    "instancesSet": { "items": [ { "instanceId": "i-0123456789abcdef0" } ] }
                }
            }
        });
        let info = classify(&event).unwrap();
        assert_eq!(info.event_name, "RunInstances");
        assert_eq!(info.instance_id.as_deref(), Some("i-0123456789abcdef0"));
        assert_eq!(info.user_identity.unwrap().principal(), Some("alice"));
    }

    #[test]
    fn reconstructs_load_balancer_arn_from_listener() {
        let event = json!({
            "detail-type": "AWS API Call via CloudTrail",
            "account": "111", "region": "us-east-1", "time": "2026-01-01T00:00:00Z",
            "detail": {
                "eventName": "ModifyListener",
                "eventSource": "elasticloadbalancing.amazonaws.com",
                "requestParameters": {
                    "listenerArn": "arn:aws:elasticloadbalancing:us-east-1:111:listener/app/web/abcd/1234"
                }
            }
        });
        let info = classify(&event).unwrap();
        assert_eq!(
            info.load_balancer_arn.as_deref(),
            Some("arn:aws:elasticloadbalancing:us-east-1:111:loadbalancer/app/web/abcd")
        );
    }

    #[test]
    fn guardduty_finding_extracts_instance_id() {
        let event = json!({
            "detail-type": "GuardDuty Finding",
            "source": "aws.guardduty",
            "account": "111", "region": "us-east-1", "time": "2026-01-01T00:00:00Z",
            "detail": {
                "type": "CryptoCurrency:EC2/BitcoinTool.B!DNS",
                "severity": 8,
                "id": "abc123",
                "resource": { "instanceDetails": { "instanceId": "i-9" } }
            }
        });
        let info = classify(&event).unwrap();
        assert_eq!(info.generic_resources.ids.contains("i-9"), true);
        assert_eq!(info.instance_id.as_deref(), Some("i-9"));
    }

    #[test]
    fn securityhub_event_name_is_detail_type() {
        let event = json!({
            "detail-type": "Security Hub Findings - Imported",
            "account": "111", "region": "us-east-1", "time": "2026-01-01T00:00:00Z",
            "detail": { "findings": [ { "Id": "arn:aws:securityhub:us-east-1:111:finding/abc" } ] }
        });
        let info = classify(&event).unwrap();
        assert_eq!(info.event_name, "Security Hub Findings - Imported");
        assert_eq!(info.finding_id.as_deref(), Some("arn:aws:securityhub:us-east-1:111:finding/abc"));
    }

    #[test]
    fn config_change_uses_resource_type_as_fallback_event_name() {
        let event = json!({
            "detail-type": "Config Configuration Item Change",
            "source": "aws.config",
            "account": "111", "region": "us-east-1", "time": "2026-01-01T00:00:00Z",
            "detail": { "resourceType": "AWS::EC2::Instance", "resourceId": "i-7" }
        });
        let info = classify(&event).unwrap();
        assert_eq!(info.event_name, "AWS::EC2::Instance");
        assert_eq!(info.instance_id.as_deref(), Some("i-7"));
    }
}
