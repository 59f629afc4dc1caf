use wiremock::{
    matchers::{body_string_contains, method},
    Mock, MockServer, ResponseTemplate,
};

/// Mount a TerminateInstances mock acknowledging `instance_id`.
pub async fn mount_terminate_ok(server: &MockServer, instance_id: &str, expected_calls: u64) {
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<TerminateInstancesResponse xmlns="http://ec2.amazonaws.com/doc/2016-11-15/">
    <requestId>7a62c49f-347e-4fc4-9331-6e8eEXAMPLE</requestId>
    <instancesSet>
        <item>
            <instanceId>{}</instanceId>
            <currentState><code>32</code><name>shutting-down</name></currentState>
            <previousState><code>16</code><name>running</name></previousState>
        </item>
    </instancesSet>
</TerminateInstancesResponse>"#,
        instance_id
    );

    Mock::given(method("POST"))
        .and(body_string_contains("Action=TerminateInstances"))
        .and(body_string_contains(format!("InstanceId.1={}", instance_id)))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/xml"))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Mount an EC2 error response for `action`.
pub async fn mount_ec2_error(server: &MockServer, action: &str, code: &str, message: &str) {
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response><Errors><Error><Code>{}</Code><Message>{}</Message></Error></Errors><RequestID>ea966190-f9aa-478e-9ede-EXAMPLE</RequestID></Response>"#,
        code, message
    );

    Mock::given(method("POST"))
        .and(body_string_contains(format!("Action={}", action)))
        .respond_with(ResponseTemplate::new(400).set_body_raw(body, "text/xml"))
        .mount(server)
        .await;
}

/// Mount one DescribeInstances page.
///
/// `token_in` restricts the mock to requests carrying that `NextToken`;
/// `token_out` is returned as the next page cursor.
pub async fn mount_describe_instances_page(
    server: &MockServer,
    token_in: Option<&str>,
    instance_ids: &[&str],
    token_out: Option<&str>,
) {
    let items: String = instance_ids
        .iter()
        .map(|id| format!("<item><instanceId>{}</instanceId><instanceType>t3.micro</instanceType></item>", id))
        .collect();
    let next = token_out
        .map(|t| format!("<nextToken>{}</nextToken>", t))
        .unwrap_or_default();
    let body = format!(
        r#"<DescribeInstancesResponse xmlns="http://ec2.amazonaws.com/doc/2016-11-15/">
<requestId>req</requestId>
<reservationSet><item><reservationId>r-1</reservationId><instancesSet>{}</instancesSet></item></reservationSet>
{}
</DescribeInstancesResponse>"#,
        items, next
    );

    let builder = Mock::given(method("POST")).and(body_string_contains("Action=DescribeInstances"));
    let (builder, priority) = match token_in {
        // Token-specific pages win over the first-page mock
        Some(token) => (
            builder.and(body_string_contains(format!("NextToken={}", token))),
            1,
        ),
        None => (builder, 5),
    };

    builder
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/xml"))
        .with_priority(priority)
        .expect(1)
        .mount(server)
        .await;
}
