//! Prints the CustomResourceDefinition manifests for all service catalog
//! resources to stdout, ready to be applied with kubectl.

use kube::CustomResourceExt;

use controller::crd::{
    ClusterServiceBroker, ClusterServiceClass, ClusterServicePlan, ServiceBinding, ServiceInstance,
};

fn main() -> anyhow::Result<()> {
    let crds = [
        serde_yaml::to_string(&ServiceBinding::crd())?,
        serde_yaml::to_string(&ServiceInstance::crd())?,
        serde_yaml::to_string(&ClusterServiceClass::crd())?,
        serde_yaml::to_string(&ClusterServicePlan::crd())?,
        serde_yaml::to_string(&ClusterServiceBroker::crd())?,
    ];
    print!("{}", crds.join("---\n"));
    Ok(())
}
