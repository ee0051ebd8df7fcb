//! Reconciliation scenarios across collectors, registry and diff

use std::collections::HashSet;

use apikit_scaffolder_core::collect::{collect_existing_entries, collect_spec_entries};
use apikit_scaffolder_core::diff::missing_entries;
use apikit_scaffolder_core::model::Triplet;
use apikit_scaffolder_core::registry::BindRequest;
use apikit_scaffolder_core::spec::{Action, MimeType, Resource};
use apikit_scaffolder_core::{
    ApiRegistry, ApiSpecification, ConfigDocument, HttpMethod, PlanRenderer, Result, Scaffolder,
    ScaffolderConfig,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn petstore() -> ApiSpecification {
    let mut post = Action::new(HttpMethod::Post);
    let mut json_body = MimeType::new("application/json");
    json_body.schema = Some(json!("Pet"));
    post.body.push(json_body);
    post.body.push(MimeType::new("text/plain"));

    let mut by_id = Resource::new("/{petId}");
    by_id.actions.push(Action::new(HttpMethod::Get));
    by_id.actions.push(Action::new(HttpMethod::Delete));

    let mut pet = Resource::new("/pet");
    pet.actions.push(Action::new(HttpMethod::Get));
    pet.actions.push(post);
    pet.resources.push(by_id);

    let mut spec = ApiSpecification::new("src/main/resources/api/petstore.raml");
    spec.resources.push(pet);
    spec
}

fn settings() -> ScaffolderConfig {
    ScaffolderConfig::default()
}

#[test]
fn test_diff_is_empty_when_everything_exists() -> Result<()> {
    let mut registry = ApiRegistry::new(settings());
    let spec = collect_spec_entries(&petstore(), &mut registry)?;
    let existing: HashSet<Triplet> = spec.triplets().cloned().collect();
    assert!(missing_entries(&spec.entries, &existing, true).is_empty());
    Ok(())
}

#[test]
fn test_first_run_returns_every_entry() -> Result<()> {
    let mut registry = ApiRegistry::new(settings());
    let spec = collect_spec_entries(&petstore(), &mut registry)?;
    assert!(!registry.has_existing_bindings());

    let existing: HashSet<Triplet> = spec.triplets().take(2).cloned().collect();
    let names: Vec<_> = missing_entries(&spec.entries, &existing, registry.has_existing_bindings())
        .iter()
        .map(|e| e.name())
        .collect();
    assert_eq!(
        names,
        vec![
            "delete:/pet/{petId}",
            "get:/pet",
            "get:/pet/{petId}",
            "post:/pet",
            "post:/pet:application/json",
        ]
    );
    Ok(())
}

#[test]
fn test_rescan_of_generated_output_is_idempotent() -> Result<()> {
    let scaffolder = Scaffolder::new(settings());
    let first = scaffolder.run(&[petstore()], &[])?;
    assert_eq!(first.flows.len(), 5);

    let rendered = PlanRenderer::new()?.render(&first)?;
    let documents = rendered
        .iter()
        .map(|(file, content)| ConfigDocument::parse(file.as_str(), content))
        .collect::<Result<Vec<_>>>()?;

    let mut registry = ApiRegistry::new(settings());
    let existing = collect_existing_entries(&documents, &["src/main/resources/api/petstore.raml"], &mut registry);
    assert!(existing.errors.is_empty());
    let spec = collect_spec_entries(&petstore(), &mut registry)?;
    assert_eq!(existing.triplets, spec.triplets().cloned().collect::<HashSet<_>>());
    assert!(missing_entries(&spec.entries, &existing.triplets, registry.has_existing_bindings()).is_empty());
    Ok(())
}

#[test]
fn test_manual_edits_are_preserved() -> Result<()> {
    // One flow written by hand, with the legacy unnamed config
    let doc = ConfigDocument::parse(
        "api.xml",
        r#"<mule xmlns="http://www.mulesoft.org/schema/mule/core"
      xmlns:http="http://www.mulesoft.org/schema/mule/http"
      xmlns:apikit="http://www.mulesoft.org/schema/mule/mule-apikit">
    <http:listener-config name="shared">
        <http:listener-connection host="localhost" port="${http.port}"/>
    </http:listener-config>
    <apikit:config api="petstore.raml"/>
    <flow name="main">
        <http:listener config-ref="shared" path="/store/*"/>
        <apikit:router/>
    </flow>
    <flow name="get:\pet">
        <logger message="custom"/>
    </flow>
</mule>"#,
    )?;
    let plan = Scaffolder::new(settings()).run(&[petstore()], &[doc])?;

    assert!(plan.errors.is_empty());
    assert!(plan.new_api_files().is_empty());
    let flows: Vec<_> = plan.flows.iter().map(|f| f.flow_name.as_str()).collect();
    assert_eq!(
        flows,
        vec![
            r"delete:\pet\(petId)",
            r"get:\pet\(petId)",
            r"post:\pet",
            r"post:\pet:application/json",
        ]
    );
    assert!(plan.flows.iter().all(|f| f.file == "api.xml"));
    assert_eq!(plan.flows[0].entry.uri, "/store/pet/{petId}");
    Ok(())
}

#[test]
fn test_same_file_name_in_two_folders() -> Result<()> {
    let mut registry = ApiRegistry::new(settings());
    let a = registry.bind(BindRequest::new("v1/api.raml"))?;
    let b = registry.bind(BindRequest::new("v2/api.raml"))?;
    assert_eq!(registry.binding(a).id, "api");
    assert_eq!(registry.binding(b).id, "api-2");
    Ok(())
}

#[test]
fn test_three_new_apis_get_consecutive_ports() -> Result<()> {
    let mut registry = ApiRegistry::new(settings());
    let mut ports = Vec::new();
    for file in ["a.raml", "b.raml", "c.raml"] {
        let id = registry.bind(BindRequest::new(file))?;
        let listener = registry.binding(id).http_listener_config.clone().unwrap_or_default();
        ports.push(registry.listener_config(&listener).map(|l| l.port.clone()).unwrap_or_default());
    }
    assert_eq!(ports, vec!["8081", "8082", "8083"]);
    Ok(())
}

#[test]
fn test_unused_listener_is_reused_for_another_path() -> Result<()> {
    let mut registry = ApiRegistry::new(settings());
    let first = registry.bind(BindRequest::new("a.raml"))?;
    let second = registry.bind(BindRequest::new("b.raml").path("/b/*"))?;
    assert_eq!(
        registry.binding(first).http_listener_config,
        registry.binding(second).http_listener_config
    );
    assert_eq!(registry.listener_configs().len(), 1);
    Ok(())
}
