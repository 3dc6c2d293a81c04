use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    println!("---");
    print!("{}", serde_yaml::to_string(&controller::Project::crd())?);
    println!("---");
    print!("{}", serde_yaml::to_string(&controller::Customer::crd())?);
    Ok(())
}
