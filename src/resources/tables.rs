use indexmap::IndexMap;
use once_cell::sync::Lazy;

/// Per-resource-type field/prefix table driving the filter & prefetch
/// builder.
#[derive(Debug, Clone, Copy)]
pub struct ResourceTypeSpec {
    pub resource_type: &'static str,
    /// Service component expected in a compatible ARN, and the dispatch key
    /// used to pick an AWS SDK client for prefetch.
    pub service: &'static str,
    pub arn_field: Option<&'static str>,
    pub id_field: Option<&'static str>,
    pub name_field: Option<&'static str>,
    pub id_prefix: Option<&'static str>,
}

macro_rules! spec {
    ($resource_type:expr, $service:expr, $arn:expr, $id:expr, $name:expr, $prefix:expr) => {
        ResourceTypeSpec {
            resource_type: $resource_type,
            service: $service,
            arn_field: $arn,
            id_field: $id,
            name_field: $name,
            id_prefix: $prefix,
        }
    };
}

static TABLE: Lazy<IndexMap<&'static str, ResourceTypeSpec>> = Lazy::new(|| {
    let entries = [
        spec!("aws.ec2", "ec2", Some("Arn"), Some("InstanceId"), None, Some("i-")),
        spec!("aws.ami", "ec2", Some("Arn"), Some("ImageId"), None, Some("ami-")),
        spec!("aws.ebs", "ec2", Some("Arn"), Some("VolumeId"), None, Some("vol-")),
        spec!(
            "aws.ebs-snapshot",
            "ec2",
            Some("Arn"),
            Some("SnapshotId"),
            None,
            Some("snap-")
        ),
        spec!(
            "aws.security-group",
            "ec2",
            Some("Arn"),
            Some("GroupId"),
            None,
            Some("sg-")
        ),
        spec!("aws.vpc", "ec2", Some("Arn"), Some("VpcId"), None, Some("vpc-")),
        spec!("aws.subnet", "ec2", Some("Arn"), Some("SubnetId"), None, Some("subnet-")),
        // Open Question resolution (DESIGN.md): `Name`, not `Arn`.
        spec!("aws.s3", "s3", None, None, Some("Name"), None),
        // ARN service component is "elasticloadbalancing" for both classic
        // and v2 load balancers; `service` doubles as the prefetch dispatch
        // key (prefetch.rs), which routes it to the elbv2 SDK client.
        spec!(
            "aws.app-elb",
            "elasticloadbalancing",
            Some("LoadBalancerArn"),
            None,
            None,
            None
        ),
        spec!("aws.elb", "elb", None, None, Some("LoadBalancerName"), None),
        spec!("aws.rds", "rds", Some("Arn"), Some("DbInstanceIdentifier"), None, None),
        spec!(
            "aws.cache-cluster",
            "elasticache",
            Some("ARN"),
            Some("CacheClusterId"),
            None,
            None
        ),
        spec!("aws.iam-user", "iam", Some("Arn"), None, Some("UserName"), None),
        spec!("aws.iam-role", "iam", Some("Arn"), None, Some("RoleName"), None),
        spec!("aws.lambda", "lambda", Some("Arn"), None, Some("FunctionName"), None),
        spec!("aws.distribution", "cloudfront", Some("Arn"), Some("Id"), None, None),
        spec!("aws.ecr", "ecr", Some("Arn"), None, Some("RepositoryName"), None),
        spec!("aws.eks", "eks", Some("Arn"), None, Some("name"), None),
        spec!("aws.efs", "efs", Some("Arn"), Some("FileSystemId"), None, None),
        spec!("aws.kinesis", "kinesis", Some("Arn"), None, Some("StreamName"), None),
        spec!("aws.sns", "sns", Some("Arn"), None, None, None),
        spec!("aws.sqs", "sqs", None, None, Some("QueueUrl"), None),
    ];
    entries.into_iter().map(|e| (e.resource_type, e)).collect()
});

pub fn lookup(resource_type: &str) -> Option<&'static ResourceTypeSpec> {
    TABLE.get(resource_type)
}

/// Maps a resource type to the AWS service key used to decide which SDK
/// client a prefetch call is dispatched to.
pub fn service_for(resource_type: &str) -> Option<&'static str> {
    lookup(resource_type).map(|spec| spec.service)
}

/// ARN-type compatibility: the ARN's service component must equal the
/// type's mapped service.
pub fn arn_matches_type(arn: &str, resource_type: &str) -> bool {
    let Some(spec) = lookup(resource_type) else {
        return false;
    };
    arn_service(arn).is_some_and(|service| service == spec.service)
}

fn arn_service(arn: &str) -> Option<&str> {
    // arn:<partition>:<service>:<region>:<account>:<resource>
    arn.splitn(6, ':').nth(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ec2_arn_is_compatible_with_ec2_type() {
        assert!(arn_matches_type(
            "arn:aws:ec2:us-east-1:111:instance/i-abc",
            "aws.ec2"
        ));
    }

    #[test]
    fn s3_arn_is_not_compatible_with_ec2_type() {
        assert!(!arn_matches_type("arn:aws:s3:::my-bucket", "aws.ec2"));
    }

    #[test]
    fn ami_and_ebs_share_the_ec2_service_but_have_distinct_prefixes() {
        let ami = lookup("aws.ami").unwrap();
        let ebs = lookup("aws.ebs").unwrap();
        assert_eq!(ami.service, "ec2");
        assert_eq!(ebs.service, "ec2");
        assert_eq!(ami.id_prefix, Some("ami-"));
        assert_eq!(ebs.id_prefix, Some("vol-"));
    }

    #[test]
    fn s3_name_field_is_name_not_arn() {
        let s3 = lookup("aws.s3").unwrap();
        assert_eq!(s3.name_field, Some("Name"));
        assert_eq!(s3.arn_field, None);
    }
}
