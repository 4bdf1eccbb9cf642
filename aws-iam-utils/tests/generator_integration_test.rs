//! Integration tests for policy generation against the embedded action data
//!
//! Generated policies are checked through the public classification API, and wildcard
//! policies are expanded to confirm which literal actions they grant.

use std::sync::Arc;

use aws_iam_utils::{
    AccessLevel, ActionCatalog, PolicyChecker, PolicyDocument, PolicyGenerator,
    WILDCARD_ARN_TYPE,
};

const SERVICES: [&str; 7] = ["s3", "lambda", "events", "wafv2", "ssm", "ec2", "es"];

struct Fixture {
    generator: PolicyGenerator,
    checker: PolicyChecker,
}

fn fixture() -> Fixture {
    let catalog = Arc::new(ActionCatalog::embedded().expect("embedded action data loads"));
    Fixture {
        generator: PolicyGenerator::new(Arc::clone(&catalog)),
        checker: PolicyChecker::new(catalog),
    }
}

fn expanded_actions(checker: &PolicyChecker, policy: &PolicyDocument) -> Vec<String> {
    checker
        .expanded_items(policy)
        .unwrap()
        .into_iter()
        .map(|item| item.action)
        .collect()
}

#[test]
fn test_generated_policies_stay_within_requested_levels() {
    let f = fixture();
    let level_sets: [&[AccessLevel]; 3] = [
        &[AccessLevel::List],
        &[AccessLevel::List, AccessLevel::Read],
        &[AccessLevel::List, AccessLevel::Read, AccessLevel::Write],
    ];

    for service in SERVICES {
        for levels in level_sets {
            for use_wildcard_verbs in [true, false] {
                let policy = f
                    .generator
                    .generate_policy_for_service(service, levels, use_wildcard_verbs)
                    .unwrap_or_else(|e| panic!("generation failed for {}: {}", service, e));

                assert!(
                    f.checker.has_only_access_levels(&policy, levels).unwrap(),
                    "{} policy exceeds {:?}",
                    service,
                    levels
                );
                for action in policy.statement[0].actions() {
                    assert!(action.starts_with(&format!("{}:", service)));
                }
            }
        }
    }
}

#[test]
fn test_wildcard_and_literal_generation_grant_the_same_actions() {
    let f = fixture();
    let levels = [AccessLevel::List, AccessLevel::Read];

    for service in SERVICES {
        let compact = f
            .generator
            .generate_policy_for_service(service, &levels, true)
            .unwrap();
        let literal = f
            .generator
            .generate_policy_for_service(service, &levels, false)
            .unwrap();

        assert!(
            f.checker.policies_are_equal(&compact, &literal).unwrap(),
            "compact and literal {} policies differ",
            service
        );
    }
}

#[test]
fn test_generation_uses_action_overrides() {
    let f = fixture();
    let policy = f
        .generator
        .generate_policy_for_service("events", &[AccessLevel::List, AccessLevel::Read], true)
        .unwrap();

    assert!(expanded_actions(&f.checker, &policy).contains(&"events:describeendpoint".to_string()));

    let policy = f
        .generator
        .generate_read_only_policy_for_service("lambda")
        .unwrap();
    assert!(
        expanded_actions(&f.checker, &policy).contains(&"lambda:getfunctionurlconfig".to_string())
    );
}

#[test]
fn test_generation_includes_wildcard_resource_actions() {
    let f = fixture();
    let levels = [AccessLevel::List, AccessLevel::Read];

    let policy = f
        .generator
        .generate_policy_for_service("ssm", &levels, true)
        .unwrap();
    assert!(expanded_actions(&f.checker, &policy).contains(&"ssm:describeparameters".to_string()));

    let policy = f
        .generator
        .generate_policy_for_service("ec2", &levels, true)
        .unwrap();
    assert!(expanded_actions(&f.checker, &policy).contains(&"ec2:describeflowlogs".to_string()));
}

#[test]
fn test_arn_type_generation_with_and_without_service_wide_actions() {
    let f = fixture();
    let levels = [AccessLevel::List, AccessLevel::Read];

    for (service, arn_type, wide_action) in [
        ("ssm", "parameter", "ssm:describeparameters"),
        ("ec2", "vpc-flow-log", "ec2:describeflowlogs"),
    ] {
        let with = f
            .generator
            .generate_policy_for_service_arn_type(service, arn_type, &levels, true)
            .unwrap();
        assert!(expanded_actions(&f.checker, &with).contains(&wide_action.to_string()));
        assert!(f
            .checker
            .has_only_arn_types(&with, service, &[arn_type, WILDCARD_ARN_TYPE])
            .unwrap());

        let without = f
            .generator
            .generate_policy_for_service_arn_type(service, arn_type, &levels, false)
            .unwrap();
        assert!(!expanded_actions(&f.checker, &without).contains(&wide_action.to_string()));
        assert!(f
            .checker
            .has_only_arn_types(&without, service, &[arn_type])
            .unwrap());
    }
}

#[test]
fn test_arn_type_variants_for_s3_bucket() {
    let f = fixture();

    let read_only = f
        .generator
        .generate_read_only_policy_for_service_arn_type("s3", "bucket")
        .unwrap();
    assert!(f.checker.is_read_only(&read_only).unwrap());
    assert!(f
        .checker
        .has_only_arn_types(&read_only, "s3", &["bucket"])
        .unwrap());

    let read_write = f
        .generator
        .generate_read_write_policy_for_service_arn_type("s3", "bucket")
        .unwrap();
    assert!(f.checker.is_read_write(&read_write).unwrap());
    assert!(f
        .checker
        .has_only_arn_types(&read_write, "s3", &["bucket"])
        .unwrap());

    let list_only = f
        .generator
        .generate_list_only_policy_for_service_arn_type("s3", "bucket")
        .unwrap();
    assert!(f.checker.is_list_only(&list_only).unwrap());
    assert!(f
        .checker
        .has_only_arn_types(&list_only, "s3", &["bucket"])
        .unwrap());
    assert!(!f
        .checker
        .has_only_arn_types(&list_only, "s3", &["object"])
        .unwrap());
}

#[test]
fn test_list_only_policy_for_wildcard_arn_type() {
    let f = fixture();
    let policy = f
        .generator
        .generate_list_only_policy_for_service_arn_type("s3", WILDCARD_ARN_TYPE)
        .unwrap();

    assert!(f.checker.is_list_only(&policy).unwrap());
    assert!(f
        .checker
        .has_only_arn_types(&policy, "s3", &[WILDCARD_ARN_TYPE])
        .unwrap());
    assert!(policy.statement[0].actions().contains(&"s3:ListAllMyBuckets"));
}
