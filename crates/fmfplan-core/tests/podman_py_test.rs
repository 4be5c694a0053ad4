//! Integration tests against the podman-py reference plans.
//!
//! Covers inheritance of prepare steps across plan groups, context-driven
//! adjustments and discover filtering against the matching test catalog.

use fmfplan_core::plan::StepHow;
use fmfplan_core::{Context, PlanTree, ResolvedPlan, TestCatalog};
use fmfplan_test_utils::{PODMAN_PY_PLANS, PODMAN_PY_TESTS, podman_py_files};

fn plans() -> PlanTree {
    PlanTree::from_yaml_str(PODMAN_PY_PLANS).expect("reference plans should load")
}

fn packit_fedora() -> Context {
    Context::new()
        .with("initiator", "packit")
        .with("distro", "fedora")
}

fn step_names(plan: &ResolvedPlan) -> Vec<&str> {
    plan.prepare.iter().map(|step| step.name.as_str()).collect()
}

fn selected(plan: &ResolvedPlan) -> Vec<String> {
    let catalog = TestCatalog::from_yaml_str(PODMAN_PY_TESTS).expect("catalog should load");
    catalog
        .select(plan)
        .into_iter()
        .map(|test| test.name.clone())
        .collect()
}

#[test]
fn lists_every_leaf_plan_in_order() {
    assert_eq!(
        plans().plans(),
        vec![
            "/upstream/base_python",
            "/upstream/all_python",
            "/distro/sanity",
            "/distro/base_python",
            "/distro/all_python",
            "/downstream/base_python",
        ]
    );
}

#[test]
fn distro_sanity_for_packit_on_fedora() {
    let plan = plans().resolve("/distro/sanity", &packit_fedora()).unwrap();

    assert!(plan.enabled);
    assert_eq!(
        step_names(&plan),
        vec![
            "pkg dependencies",
            "enable ssh key",
            "pip dependencies",
            "enable testing repositories",
        ]
    );
    assert!(plan.skipped.is_empty());

    let install = &plan.prepare[0];
    assert_eq!(install.how(), StepHow::Install);
    assert_eq!(install.items(), ["make", "python3-pip", "podman"]);
    assert_eq!(plan.prepare[3].how(), StepHow::Shell);
    assert_eq!(plan.prepare[3].items().len(), 2);

    assert_eq!(plan.discover.how, "fmf");
    assert_eq!(plan.filter_strings(), vec!["tag:lint | tag:coverage & tag:stable"]);
    assert_eq!(plan.execute.how, "tmt");
}

#[test]
fn parent_steps_precede_child_steps() {
    let plan = plans()
        .resolve("/upstream/all_python", &packit_fedora())
        .unwrap();
    assert_eq!(
        step_names(&plan),
        vec![
            "pkg dependencies",
            "enable ssh key",
            "pip dependencies",
            "enable podman-next copr",
            "install python versions",
        ]
    );
}

#[test]
fn undefined_dimensions_skip_steps_without_error() {
    let plan = plans().resolve("/distro/sanity", &Context::new()).unwrap();
    assert_eq!(
        step_names(&plan),
        vec!["pkg dependencies", "enable ssh key", "pip dependencies"]
    );
    assert_eq!(plan.skipped.len(), 1);
    assert_eq!(plan.skipped[0].step.name, "enable testing repositories");
    assert_eq!(
        plan.skipped[0].when,
        vec!["initiator == packit && distro == fedora"]
    );
}

#[test]
fn upstream_plans_require_packit() {
    let tree = plans();
    for name in ["/upstream/base_python", "/upstream/all_python"] {
        let bare = tree.resolve(name, &Context::new()).unwrap();
        assert!(!bare.enabled, "{name} should be disabled without an initiator");
        assert_eq!(bare.adjustments.len(), 1);

        let manual = tree
            .resolve(name, &Context::new().with("initiator", "human"))
            .unwrap();
        assert!(!manual.enabled, "{name} should be disabled for other initiators");

        let packit = tree
            .resolve(name, &Context::new().with("initiator", "packit"))
            .unwrap();
        assert!(packit.enabled, "{name} should be enabled for packit");
        assert!(packit.adjustments.is_empty());
    }
}

#[test]
fn distro_matrix_only_runs_on_fedora() {
    let tree = plans();
    let centos = tree
        .resolve("/distro/all_python", &Context::new().with("distro", "centos-stream-9"))
        .unwrap();
    assert!(!centos.enabled);
    assert_eq!(
        centos.adjustments[0].because.as_deref(),
        Some("extra Python interpreters are only packaged in Fedora")
    );

    let fedora = tree
        .resolve("/distro/all_python", &Context::new().with("distro", "fedora-41"))
        .unwrap();
    assert!(fedora.enabled);
}

#[test]
fn resolution_is_idempotent() {
    let tree = plans();
    let context = packit_fedora();
    let first = tree.resolve_all(&context).unwrap();
    let second = tree.resolve_all(&context).unwrap();
    assert_eq!(first, second);
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    let other = tree.resolve("/distro/sanity", &Context::new()).unwrap();
    let sanity = first.iter().find(|p| p.name == "/distro/sanity").unwrap();
    assert_ne!(sanity.fingerprint(), other.fingerprint());
}

#[test]
fn downstream_carries_environment() {
    let plan = plans()
        .resolve("/downstream/base_python", &Context::new())
        .unwrap();
    assert_eq!(
        plan.environment.get("PODMAN_PY_DOWNSTREAM").map(String::as_str),
        Some("1")
    );
    assert_eq!(step_names(&plan).len(), 3);
}

#[test]
fn discover_filters_select_catalog_tests() {
    let tree = plans();
    let context = packit_fedora();
    let resolve = |name: &str| tree.resolve(name, &context).unwrap();

    assert_eq!(selected(&resolve("/distro/sanity")), vec!["/lint", "/coverage"]);
    assert_eq!(
        selected(&resolve("/distro/base_python")),
        vec!["/unittest", "/integration"]
    );
    assert_eq!(selected(&resolve("/distro/all_python")), vec!["/tox"]);
    assert_eq!(
        selected(&resolve("/upstream/base_python")),
        vec!["/unittest", "/integration"]
    );
    assert_eq!(selected(&resolve("/upstream/all_python")), vec!["/tox"]);
    assert_eq!(selected(&resolve("/downstream/base_python")), vec!["/unittest"]);
}

#[test]
fn loads_reference_documents_from_disk() {
    let (_dir, plans_path, tests_path) = podman_py_files();
    let tree = PlanTree::load(&plans_path).unwrap();
    assert_eq!(tree.plans().len(), 6);
    assert!(tree.origin().ends_with("plans.fmf"));

    let catalog = TestCatalog::load(&tests_path).unwrap();
    assert_eq!(catalog.tests().len(), 5);
}

#[test]
fn reports_guard_dimensions() {
    let dims: Vec<String> = plans().dimensions().into_iter().collect();
    assert_eq!(dims, vec!["distro", "initiator"]);
}
