use crate::template::{Output, Parameter, Resource, TemplateBuilder};
use crate::value::Value;

fn tags(network: &str) -> Value {
    Value::list([
        Value::tag("Application", Value::stack_id()),
        Value::tag("Network", network),
    ])
}

fn subnet(name: &str, cidr: &str, zone: &str, suffix: &str, network: &str) -> Resource {
    Resource::new(name, "AWS::EC2::Subnet")
        .property("VpcId", Value::reference("VPC"))
        .property("CidrBlock", cidr)
        .property("AvailabilityZone", Value::select(zone, Value::get_azs(Value::region())))
        .property(
            "Tags",
            Value::list([
                Value::tag(
                    "Name",
                    Value::join("-", [Value::reference("VPCName"), Value::from(suffix)]),
                ),
                Value::tag("Application", Value::stack_id()),
                Value::tag("Network", network),
            ]),
        )
}

fn route_table(name: &str, network: &str) -> Resource {
    Resource::new(name, "AWS::EC2::RouteTable")
        .property("VpcId", Value::reference("VPC"))
        .property("Tags", tags(network))
}

fn network_acl(name: &str, network: &str) -> Resource {
    Resource::new(name, "AWS::EC2::NetworkAcl")
        .property("VpcId", Value::reference("VPC"))
        .property("Tags", tags(network))
}

/// TCP rule of a network ACL, all values are strings as CloudFormation accepts them
fn acl_entry(name: &str, acl: &str, rule: &str, egress: bool, ports: (&str, &str)) -> Resource {
    Resource::new(name, "AWS::EC2::NetworkAclEntry")
        .property("NetworkAclId", Value::reference(acl))
        .property("RuleNumber", rule)
        .property("Protocol", "6")
        .property("RuleAction", "allow")
        .property("Egress", if egress { "true" } else { "false" })
        .property("CidrBlock", "0.0.0.0/0")
        .property("PortRange", Value::map([("From", ports.0), ("To", ports.1)]))
}

fn route_table_association(name: &str, subnet: &str, table: &str) -> Resource {
    Resource::new(name, "AWS::EC2::SubnetRouteTableAssociation")
        .property("SubnetId", Value::reference(subnet))
        .property("RouteTableId", Value::reference(table))
}

fn acl_association(name: &str, subnet: &str, acl: &str) -> Resource {
    Resource::new(name, "AWS::EC2::SubnetNetworkAclAssociation")
        .property("SubnetId", Value::reference(subnet))
        .property("NetworkAclId", Value::reference(acl))
}

/// VPC that has two public subnets and two private subnets in different AZs
pub fn vpc() -> TemplateBuilder {
    TemplateBuilder::new()
        .description("VPC that has two public subnets and two private subnets in different AZs")
        .parameter(Parameter::new("VPCName", "String").description("OpenShift instance type"))
        .resource(
            Resource::new("VPC", "AWS::EC2::VPC")
                .property("CidrBlock", "10.0.0.0/16")
                .property(
                    "Tags",
                    Value::list([
                        Value::tag("Name", Value::reference("VPCName")),
                        Value::tag("Application", Value::stack_id()),
                        Value::tag("Network", "Public"),
                    ]),
                ),
        )
        .resource(subnet("PublicSubnet1", "10.0.0.0/24", "0", "public-a", "Public"))
        .resource(subnet("PublicSubnet2", "10.0.2.0/24", "1", "public-b", "Public"))
        .resource(
            Resource::new("InternetGateway", "AWS::EC2::InternetGateway")
                .property("Tags", tags("Public")),
        )
        .resource(
            Resource::new("GatewayToInternet", "AWS::EC2::VPCGatewayAttachment")
                .property("VpcId", Value::reference("VPC"))
                .property("InternetGatewayId", Value::reference("InternetGateway")),
        )
        .resource(route_table("PublicRouteTable", "Public"))
        .resource(
            Resource::new("PublicRoute", "AWS::EC2::Route")
                .depends_on("GatewayToInternet")
                .property("RouteTableId", Value::reference("PublicRouteTable"))
                .property("DestinationCidrBlock", "0.0.0.0/0")
                .property("GatewayId", Value::reference("InternetGateway")),
        )
        .resource(route_table_association(
            "PublicSubnetRouteTableAssociation1",
            "PublicSubnet1",
            "PublicRouteTable",
        ))
        .resource(route_table_association(
            "PublicSubnetRouteTableAssociation2",
            "PublicSubnet2",
            "PublicRouteTable",
        ))
        .resource(network_acl("PublicNetworkAcl", "Public"))
        .resource(acl_entry(
            "InboundHTTPPublicNetworkAclEntry",
            "PublicNetworkAcl",
            "100",
            false,
            ("80", "80"),
        ))
        .resource(acl_entry(
            "InboundHTTPSPublicNetworkAclEntry",
            "PublicNetworkAcl",
            "101",
            false,
            ("443", "443"),
        ))
        .resource(acl_entry(
            "InboundSSHPublicNetworkAclEntry",
            "PublicNetworkAcl",
            "102",
            false,
            ("22", "22"),
        ))
        .resource(acl_entry(
            "InboundDynamicPortsPublicNetworkAclEntry",
            "PublicNetworkAcl",
            "103",
            false,
            ("1024", "65535"),
        ))
        .resource(acl_entry(
            "OutboundPublicNetworkAclEntry",
            "PublicNetworkAcl",
            "100",
            true,
            ("0", "65535"),
        ))
        .resource(acl_association(
            "PublicSubnetNetworkAclAssociation1",
            "PublicSubnet1",
            "PublicNetworkAcl",
        ))
        .resource(acl_association(
            "PublicSubnetNetworkAclAssociation2",
            "PublicSubnet2",
            "PublicNetworkAcl",
        ))
        .resource(subnet("PrivateSubnet1", "10.0.1.0/24", "0", "private-a", "Private"))
        .resource(subnet("PrivateSubnet2", "10.0.3.0/24", "1", "private-b", "Private"))
        .resource(route_table("PrivateRouteTable1", "Private"))
        .resource(route_table("PrivateRouteTable2", "Private"))
        .resource(route_table_association(
            "PrivateSubnetRouteTableAssociation1",
            "PrivateSubnet1",
            "PrivateRouteTable1",
        ))
        .resource(route_table_association(
            "PrivateSubnetRouteTableAssociation2",
            "PrivateSubnet2",
            "PrivateRouteTable2",
        ))
        .resource(network_acl("PrivateNetworkAcl", "Private"))
        .resource(acl_entry(
            "InboundPrivateNetworkAclEntry",
            "PrivateNetworkAcl",
            "100",
            false,
            ("0", "65535"),
        ))
        .resource(acl_entry(
            "OutboundPrivateNetworkAclEntry",
            "PrivateNetworkAcl",
            "100",
            true,
            ("0", "65535"),
        ))
        .resource(acl_association(
            "PrivateSubnetNetworkAclAssociation1",
            "PrivateSubnet1",
            "PrivateNetworkAcl",
        ))
        .resource(acl_association(
            "PrivateSubnetNetworkAclAssociation2",
            "PrivateSubnet2",
            "PrivateNetworkAcl",
        ))
        .output(Output::new("VpcId", Value::reference("VPC")).description("VPC"))
        .output(
            Output::new(
                "PublicSubnets",
                Value::join(
                    ",",
                    [Value::reference("PublicSubnet1"), Value::reference("PublicSubnet2")],
                ),
            )
            .description("Public subnet"),
        )
        .output(
            Output::new(
                "PrivateSubnets",
                Value::join(
                    ",",
                    [Value::reference("PrivateSubnet1"), Value::reference("PrivateSubnet2")],
                ),
            )
            .description("Private subnet"),
        )
        .output(
            Output::new(
                "AZs",
                Value::join(
                    ",",
                    [
                        Value::get_att("PrivateSubnet1", "AvailabilityZone"),
                        Value::get_att("PrivateSubnet2", "AvailabilityZone"),
                    ],
                ),
            )
            .description("Availability zones"),
        )
}

#[cfg(test)]
mod tests {
    use super::vpc;
    use serde_json::json;

    #[test]
    fn assembles() {
        let document = vpc().build().assemble().unwrap();

        assert_eq!(document.resources().len(), 28);
        assert_eq!(document.order()[0], "VPC");
        assert_eq!(
            document.resource("PublicRoute").unwrap().depends_on,
            vec!["GatewayToInternet"]
        );

        let position = |name: &str| document.order().iter().position(|n| n == name).unwrap();
        assert!(position("GatewayToInternet") < position("PublicRoute"));
        assert!(position("PublicRouteTable") < position("PublicRoute"));
        assert!(position("PrivateSubnet2") < position("PrivateSubnetNetworkAclAssociation2"));
    }

    #[test]
    fn subnets_reference_the_vpc() {
        let json = serde_json::to_value(vpc().build().assemble().unwrap()).unwrap();

        for subnet in ["PublicSubnet1", "PublicSubnet2", "PrivateSubnet1", "PrivateSubnet2"] {
            assert_eq!(json["Resources"][subnet]["Properties"]["VpcId"], json!({"Ref": "VPC"}));
        }

        assert_eq!(
            json["Resources"]["PrivateSubnet2"]["Properties"]["AvailabilityZone"],
            json!({"Fn::Select": ["1", {"Fn::GetAZs": {"Ref": "AWS::Region"}}]})
        );
        assert_eq!(json["Resources"]["PublicRoute"]["DependsOn"], json!("GatewayToInternet"));
        assert_eq!(
            json["Outputs"]["AZs"]["Value"],
            json!({"Fn::Join": [",", [
                {"Fn::GetAtt": ["PrivateSubnet1", "AvailabilityZone"]},
                {"Fn::GetAtt": ["PrivateSubnet2", "AvailabilityZone"]}
            ]]})
        );
    }

    #[test]
    fn network_acl_entries() {
        let json = serde_json::to_value(vpc().build().assemble().unwrap()).unwrap();

        assert_eq!(
            json["Resources"]["InboundDynamicPortsPublicNetworkAclEntry"]["Properties"],
            json!({
                "NetworkAclId": {"Ref": "PublicNetworkAcl"},
                "RuleNumber": "103",
                "Protocol": "6",
                "RuleAction": "allow",
                "Egress": "false",
                "CidrBlock": "0.0.0.0/0",
                "PortRange": {"From": "1024", "To": "65535"}
            })
        );
    }
}
