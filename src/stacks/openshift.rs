use crate::interpolate::{interpolate, InterpolateError};
use crate::template::{Output, Parameter, Resource, TemplateBuilder};
use crate::value::Value;

/// `(protocol, port, open to the world)`, others are limited to the public subnet
type Ingress = (&'static str, &'static str, bool);

const MASTER_INGRESS: [Ingress; 12] = [
    ("tcp", "22", true),
    ("tcp", "53", false),
    ("udp", "53", false),
    ("tcp", "80", true),
    ("tcp", "443", true),
    ("tcp", "1936", false),
    ("udp", "4789", false),
    ("tcp", "8443", false),
    ("tcp", "10250", false),
    ("tcp", "10255", false),
    ("udp", "10255", false),
    ("tcp", "24224", false),
];

// Repeats the UDP 10255 rule, kept as declared
const NODE_INGRESS: [Ingress; 8] = [
    ("tcp", "22", true),
    ("tcp", "80", true),
    ("tcp", "443", true),
    ("udp", "4789", false),
    ("tcp", "10250", false),
    ("tcp", "10255", false),
    ("udp", "10255", false),
    ("udp", "10255", false),
];

fn statement(actions: &[&str], resources: Vec<Value>) -> Value {
    Value::map([
        ("Effect", Value::from("Allow")),
        ("Action", Value::list(actions.iter().copied())),
        ("Resource", Value::List(resources)),
    ])
}

fn role() -> Resource {
    let assume_role = Value::map([(
        "Statement",
        Value::list([Value::map([
            ("Effect", Value::from("Allow")),
            ("Principal", Value::map([("Service", "ec2.amazonaws.com")])),
            ("Action", Value::from("sts:AssumeRole")),
        ])]),
    )]);

    let statements = Value::list([
        statement(&["ec2:*"], vec![Value::from("*")]),
        statement(&["elasticloadbalancing:*"], vec![Value::from("*")]),
        statement(
            &[
                "cloudwatch:PutMetricAlarm",
                "cloudwatch:PutMetricData",
                "ec2:DescribeInstances",
                "ec2:DescribeTags",
            ],
            vec![Value::from("*")],
        ),
        statement(
            &[
                "logs:CreateLogGroup",
                "logs:CreateLogStream",
                "logs:PutLogEvents",
                "logs:DescribeLogStreams",
            ],
            vec![Value::from("arn:aws:logs:*:*:*")],
        ),
        statement(
            &["s3:GetObject"],
            vec![Value::join(
                "",
                [
                    Value::from("arn:aws:s3:::"),
                    Value::reference("OpenShiftInstallS3BucketName"),
                    Value::from("/*"),
                ],
            )],
        ),
    ]);

    Resource::new("OpenShiftRole", "AWS::IAM::Role")
        .property("AssumeRolePolicyDocument", assume_role)
        .property("Path", "/")
        .property(
            "Policies",
            Value::list([Value::map([
                ("PolicyName", Value::from("openshift")),
                ("PolicyDocument", Value::map([("Statement", statements)])),
            ])]),
        )
}

fn instance_profile(name: &str) -> Resource {
    Resource::new(name, "AWS::IAM::InstanceProfile")
        .property("Path", "/")
        .property("Roles", Value::list([Value::reference("OpenShiftRole")]))
}

fn data_volume(name: &str) -> Resource {
    Resource::new(name, "AWS::EC2::Volume")
        .property("Size", 100i64)
        .property("AvailabilityZone", Value::reference("AvailabilityZone"))
        .property("Tags", Value::list([Value::tag("Name", name)]))
}

fn volume_mount(name: &str, instance: &str, volume: &str) -> Resource {
    Resource::new(name, "AWS::EC2::VolumeAttachment")
        .property("InstanceId", Value::reference(instance))
        .property("VolumeId", Value::reference(volume))
        .property("Device", "/dev/sdk")
}

fn instance(
    name: &str,
    label: &str,
    profile: &str,
    security_group: &str,
    userdata: Value,
) -> Resource {
    Resource::new(name, "AWS::EC2::Instance")
        .property("InstanceType", Value::reference("OpenShiftInstanceType"))
        .property("KeyName", Value::reference("KeyName"))
        .property("ImageId", Value::reference("OpenShiftAMI"))
        .property("IamInstanceProfile", Value::reference(profile))
        .property("UserData", Value::base64(userdata))
        .property(
            "NetworkInterfaces",
            Value::list([Value::map([
                ("GroupSet", Value::list([Value::reference(security_group)])),
                ("AssociatePublicIpAddress", Value::from("true")),
                ("DeviceIndex", Value::from("0")),
                ("DeleteOnTermination", Value::from("true")),
                ("SubnetId", Value::reference("PublicSubnet1")),
            ])]),
        )
        .property(
            "Tags",
            Value::list([Value::tag("Name", label), Value::tag("OpenShift", "true")]),
        )
}

fn security_group(name: &str, rules: &[Ingress]) -> Resource {
    let ingress = rules.iter().map(|&(protocol, port, public)| {
        let source = if public {
            Value::from("0.0.0.0/0")
        } else {
            Value::reference("PublicSubnet1Cidr")
        };

        Value::map([
            ("IpProtocol", Value::from(protocol)),
            ("FromPort", Value::from(port)),
            ("ToPort", Value::from(port)),
            ("CidrIp", source),
        ])
    });

    Resource::new(name, "AWS::EC2::SecurityGroup")
        .property("GroupDescription", "Enable access to the OpenShift host")
        .property("VpcId", Value::reference("VpcId"))
        .property("SecurityGroupIngress", Value::list(ingress))
}

/// OpenShift service on a single master and node instance
///
/// The userdata scripts may contain `{{ ref('...') }}` markers.
pub fn openshift(
    master_userdata: &str,
    node_userdata: &str,
) -> Result<TemplateBuilder, InterpolateError> {
    let master_userdata = interpolate(master_userdata)?;
    let node_userdata = interpolate(node_userdata)?;

    let builder = TemplateBuilder::new()
        .description("OpenShift service on a single master and node instance")
        .parameter(
            Parameter::new("KeyName", "AWS::EC2::KeyPair::KeyName").description(
                "Name of an existing EC2 KeyPair to enable SSH access to the OpenShift host",
            ),
        )
        .parameter(
            Parameter::new("OpenShiftInstanceType", "String")
                .description("OpenShift instance type")
                .default("t2.large"),
        )
        .parameter(
            Parameter::new("OpenShiftAMI", "AWS::EC2::Image::Id")
                .description("OpenShift AMI ID")
                .default("ami-fedafc9d"),
        )
        .parameter(
            Parameter::new("VpcId", "AWS::EC2::VPC::Id")
                .description("VPC to deploy the OpenShift host in."),
        )
        .parameter(
            Parameter::new("AvailabilityZone", "AWS::EC2::AvailabilityZone::Name")
                .description("Availability zone to deploy the OpenShift data volume."),
        )
        .parameter(
            Parameter::new("PublicSubnet1", "AWS::EC2::Subnet::Id")
                .description("Public subnet to deploy the OpenShift host in."),
        )
        .parameter(
            Parameter::new("PublicSubnet1Cidr", "String")
                .description("Public subnet CIDR to deploy the OpenShift host in."),
        )
        .parameter(
            Parameter::new("OpenShiftInstallS3BucketName", "String")
                .description("S3 Bucket containing installation files."),
        )
        .resource(role())
        .resource(instance_profile("OpenShiftMasterInstanceProfile"))
        .resource(data_volume("OpenShiftMasterDataVolume"))
        .resource(volume_mount(
            "OpenShiftMasterDataVolumeMount",
            "OpenShiftMaster",
            "OpenShiftMasterDataVolume",
        ))
        .resource(instance(
            "OpenShiftMaster",
            "OpenShift Master",
            "OpenShiftMasterInstanceProfile",
            "OpenShiftMasterecurityGroup",
            master_userdata,
        ))
        .resource(data_volume("OpenShiftNodeDataVolume"))
        .resource(volume_mount(
            "OpenShiftNodeDataVolumeMount",
            "OpenShiftNode",
            "OpenShiftNodeDataVolume",
        ))
        .resource(instance_profile("OpenShiftNodeInstanceProfile"))
        .resource(instance(
            "OpenShiftNode",
            "OpenShift Node",
            "OpenShiftNodeInstanceProfile",
            "OpenShiftNodeSecurityGroup",
            node_userdata,
        ))
        .resource(security_group("OpenShiftMasterecurityGroup", &MASTER_INGRESS))
        .resource(security_group("OpenShiftNodeSecurityGroup", &NODE_INGRESS))
        .resource(
            Resource::new("OpenShiftMasterIPAddress", "AWS::EC2::EIP")
                .property("InstanceId", Value::reference("OpenShiftMaster")),
        )
        .output(
            Output::new("OpenShiftMasterInstanceId", Value::reference("OpenShiftMaster"))
                .description("InstanceId of the OpenShift master"),
        )
        .output(
            Output::new("OpenShiftNodeInstanceId", Value::reference("OpenShiftNode"))
                .description("InstanceId of the OpenShift node"),
        )
        .output(
            Output::new(
                "OpenShiftMasterDataVolumeId",
                Value::reference("OpenShiftMasterDataVolume"),
            )
            .description("VolumeId of the OpenShift master data"),
        )
        .output(
            Output::new("OpenShiftNodeDataVolumeId", Value::reference("OpenShiftNodeDataVolume"))
                .description("VolumeId of the OpenShift node data"),
        )
        .output(
            Output::new("OpenShiftMasterPublicIp", Value::get_att("OpenShiftMaster", "PublicIp"))
                .description("Public IP address of the OpenShift master"),
        )
        .output(
            Output::new("OpenShiftNodePublicIp", Value::get_att("OpenShiftNode", "PublicIp"))
                .description("Public IP address of the OpenShift node"),
        );

    Ok(builder)
}
