// Basic Integration Tests
//
// This file contains a set of basic functionality tests of the public API. Each test drives a
// `Cache` the way the synchronization layer would, feeding it events and checking the state the
// admission logic reads back.

use r_clusterquota::*;

fn quota(resource: &str, nominal: &str) -> ResourceQuotaSpec {
    ResourceQuotaSpec {
        name: resource.to_owned(),
        nominal_quota: nominal.parse().unwrap(),
        borrowing_limit: None,
    }
}

fn spec(cohort: Option<&str>, flavors: &[&str], nominal: &str) -> ClusterQueueSpec {
    ClusterQueueSpec {
        cohort: cohort.map(str::to_owned),
        resource_groups: vec![ResourceGroupSpec {
            covered_resources: vec!["cpu".to_owned()],
            flavors: flavors
                .iter()
                .map(|f| FlavorQuotasSpec {
                    name: f.to_string(),
                    resources: vec![quota("cpu", nominal)],
                })
                .collect(),
        }],
        namespace_selector: Some(LabelSelector::default()),
        preemption: None,
    }
}

fn workload(namespace: &str, name: &str, queue: &str, flavor: &str, cpu: i64) -> WorkloadInfo {
    WorkloadInfo::new(namespace, name, queue, "cq").with_pod_set(
        PodSetResources::new("main", 1, vec![("cpu", cpu)]).assign("cpu", flavor),
    )
}

fn usage(cache: &Cache, flavor: &str) -> Option<i64> {
    cache.cluster_queue("cq").unwrap().usage().get(flavor, "cpu").cloned()
}

// Basic Functionality Test
//
// Configure a queue, admit and remove workloads, and verify usage follows. This does not rely
// on tenant queues or cohorts, and thus is a good baseline test when changing the API.
#[test]
fn basic_operation() {
    let mut cache = Cache::new(Config::default());

    cache.add_or_update_cluster_queue("cq", &spec(None, &["default"], "10")).unwrap();
    cache.add_or_update_flavor(ResourceFlavor::new("default", Vec::new()));
    assert!{cache.cluster_queue("cq").unwrap().active()};

    cache.admit_workload(workload("ns", "a", "q", "default", 4000)).unwrap();
    cache.admit_workload(workload("ns", "b", "q", "default", 2500)).unwrap();
    assert_eq!{usage(&cache, "default"), Some(6500)};

    assert!{cache.admit_workload(workload("ns", "a", "q", "default", 1)).is_err()};
    assert_eq!{usage(&cache, "default"), Some(6500)};

    cache.remove_workload("ns/a");
    cache.remove_workload("ns/a");
    assert_eq!{usage(&cache, "default"), Some(2500)};
}

// Borrowing starts strictly above the nominal quota, and only within a cohort.
#[test]
fn borrowing_threshold() {
    let mut cache = Cache::new(Config::default());
    cache.add_or_update_cluster_queue("cq", &spec(Some("pool"), &["default"], "10")).unwrap();

    cache.admit_workload(workload("ns", "a", "q", "default", 10_000)).unwrap();
    assert!{!cache.is_borrowing("cq")};
    assert!{!cache.cohort_has_borrowing_queues("pool")};

    cache.admit_workload(workload("ns", "b", "q", "default", 1000)).unwrap();
    assert_eq!{usage(&cache, "default"), Some(11_000)};
    assert!{cache.is_borrowing("cq")};
    assert!{cache.cohort_has_borrowing_queues("pool")};

    // Leaving the cohort ends borrowing, regardless of usage.
    cache.add_or_update_cluster_queue("cq", &spec(None, &["default"], "10")).unwrap();
    assert_eq!{usage(&cache, "default"), Some(11_000)};
    assert!{!cache.is_borrowing("cq")};
    assert!{cache.cohort("pool").is_none()};
}

// A queue referencing an unregistered flavor is pending until the flavor shows up.
#[test]
fn eligibility() {
    let mut cache = Cache::new(Config::default());
    cache.reconcile_flavors(flavor::registry(vec![ResourceFlavor::new("a", Vec::new())]));
    cache.add_or_update_cluster_queue("cq", &spec(None, &["a", "b"], "10")).unwrap();
    assert_eq!{cache.cluster_queue("cq").unwrap().status(), QueueStatus::Pending};

    cache.add_or_update_flavor(ResourceFlavor::new("b", Vec::new()));
    assert_eq!{cache.cluster_queue("cq").unwrap().status(), QueueStatus::Active};

    cache.terminate_cluster_queue("cq");
    cache.reconcile_flavors(FlavorRegistry::new());
    assert_eq!{cache.cluster_queue("cq").unwrap().status(), QueueStatus::Terminating};
    cache.reconcile_flavors(flavor::registry(vec![
        ResourceFlavor::new("a", Vec::new()),
        ResourceFlavor::new("b", Vec::new()),
    ]));
    assert_eq!{cache.cluster_queue("cq").unwrap().status(), QueueStatus::Terminating};
}

// Label keys are the union of the node label keys of all flavors of a group.
#[test]
fn label_keys() {
    let mut cache = Cache::new(Config::default());
    cache.reconcile_flavors(flavor::registry(vec![
        ResourceFlavor::new("a", vec![("zone", "us-east-1a")]),
        ResourceFlavor::new("b", vec![("zone", "us-east-1b"), ("gpu", "a100")]),
    ]));

    let mut s = spec(None, &["a", "b"], "10");
    s.resource_groups.push(ResourceGroupSpec {
        covered_resources: vec!["memory".to_owned()],
        flavors: Vec::new(),
    });
    cache.add_or_update_cluster_queue("cq", &s).unwrap();

    let cq = cache.cluster_queue("cq").unwrap();
    let keys: Vec<&str> = cq.resource_groups()[0].label_keys.iter().map(String::as_str).collect();
    assert_eq!{keys, vec!["gpu", "zone"]};
    assert!{cq.resource_groups()[1].label_keys.is_empty()};
    assert!{cq.resource_group_for("memory").unwrap().flavors.is_empty()};
}

// Tenant queues registered late are backfilled from the admitted workloads.
#[test]
fn tenant_registration_backfill() {
    let mut cache = Cache::new(Config::default());
    cache.add_or_update_cluster_queue("cq", &spec(None, &["default"], "10")).unwrap();

    cache.admit_workload(workload("team", "a", "t", "default", 1000)).unwrap();
    cache.admit_workload(workload("team", "b", "t", "default", 2000)).unwrap();
    cache.admit_workload(workload("team", "c", "other", "default", 4000)).unwrap();

    cache.register_tenant_queue(&TenantQueueRef::new("team", "t", "cq")).unwrap();

    let view = cache.tenant_queue("team/t").unwrap();
    assert_eq!{view.admitted_workloads(), 2};
    assert_eq!{view.usage().get("default", "cpu"), Some(&3000)};

    cache.remove_workload("team/a");
    let view = cache.tenant_queue("team/t").unwrap();
    assert_eq!{view.admitted_workloads(), 1};
    assert_eq!{view.usage().get("default", "cpu"), Some(&2000)};
}

// Flavors are in use exactly while some group lists them.
#[test]
fn flavor_in_use() {
    let mut cache = Cache::new(Config::default());
    cache.add_or_update_cluster_queue("cq", &spec(None, &["a", "b"], "10")).unwrap();

    assert!{cache.is_flavor_in_use("a")};
    assert!{cache.is_flavor_in_use("b")};
    assert!{!cache.is_flavor_in_use("c")};

    cache.add_or_update_cluster_queue("cq", &spec(None, &["a"], "10")).unwrap();
    assert!{cache.is_flavor_in_use("a")};
    assert!{!cache.is_flavor_in_use("b")};

    cache.delete_cluster_queue("cq");
    assert!{!cache.is_flavor_in_use("a")};
}

// A quota shrink processed before a pending admission drops the charge of the removed flavor.
// Removing the workload afterwards drops the discharge as well, so nothing goes negative.
#[test]
fn quota_shrink_before_admission() {
    let mut cache = Cache::new(Config::default());
    cache.add_or_update_cluster_queue("cq", &spec(None, &["a", "b"], "10")).unwrap();
    cache.admit_workload(workload("ns", "early", "q", "b", 3000)).unwrap();

    // The admission decision for `late` was made against flavor `b`, but the shrink arrives
    // first.
    cache.add_or_update_cluster_queue("cq", &spec(None, &["a"], "10")).unwrap();
    cache.admit_workload(workload("ns", "late", "q", "b", 5000)).unwrap();
    cache.admit_workload(workload("ns", "other", "q", "a", 1000)).unwrap();

    assert_eq!{usage(&cache, "a"), Some(1000)};
    assert_eq!{usage(&cache, "b"), None};
    assert_eq!{cache.cluster_queue("cq").unwrap().workloads().len(), 3};

    // Restoring the flavor starts it from zero; the earlier workloads are not reconciled.
    cache.add_or_update_cluster_queue("cq", &spec(None, &["a", "b"], "10")).unwrap();
    assert_eq!{usage(&cache, "b"), Some(0)};

    cache.remove_workload("ns/other");
    assert_eq!{usage(&cache, "a"), Some(0)};
}

// Specs and configuration can be read from their serialized form.
#[test]
fn deserialize_spec() {
    let config: Config = serde_json::from_str(r#"{"podsReadyTracking": true}"#).unwrap();
    let s: ClusterQueueSpec = serde_json::from_str(r#"{
        "cohort": "pool",
        "namespaceSelector": { "matchLabels": { "team": "a" } },
        "preemption": { "reclaimWithinCohort": "Any", "withinClusterQueue": "LowerPriority" },
        "resourceGroups": [{
            "coveredResources": ["cpu", "memory"],
            "flavors": [{
                "name": "default",
                "resources": [
                    { "name": "cpu", "nominalQuota": "500m", "borrowingLimit": "1" },
                    { "name": "memory", "nominalQuota": "2Gi" }
                ]
            }]
        }]
    }"#).unwrap();

    let mut cache = Cache::new(config);
    cache.add_or_update_cluster_queue("cq", &s).unwrap();
    cache.admit_workload(workload("ns", "a", "q", "default", 100)).unwrap();

    let cq = cache.cluster_queue("cq").unwrap();
    let fq = &cq.resource_groups()[0].flavors[0];
    assert_eq!{fq.resources["cpu"], ResourceQuota { nominal: 500, borrowing_limit: Some(1000) }};
    assert_eq!{fq.resources["memory"], ResourceQuota { nominal: 2 << 30, borrowing_limit: None }};
    assert_eq!{cq.preemption().reclaim_within_cohort, PreemptionPolicy::Any};
    assert_eq!{cq.preemption().within_cluster_queue, PreemptionPolicy::LowerPriority};
    assert_eq!{cq.cohort(), Some("pool")};
    assert!{cq.workloads_not_ready().contains("ns/a")};

    let mut team_a = std::collections::BTreeMap::new();
    team_a.insert("team".to_owned(), "a".to_owned());
    assert!{cq.admits_namespace(&team_a)};
    assert!{!cq.admits_namespace(&std::collections::BTreeMap::new())};
}

// Usage of a cell saturates instead of overflowing when huge workloads pile up on it.
#[test]
fn saturated_usage() {
    let mut cache = Cache::new(Config::default());
    let s = ClusterQueueSpec {
        cohort: None,
        resource_groups: vec![ResourceGroupSpec {
            covered_resources: vec!["memory".to_owned()],
            flavors: vec![FlavorQuotasSpec {
                name: "f".to_owned(),
                resources: vec![quota("memory", "8Ei")],
            }],
        }],
        namespace_selector: None,
        preemption: None,
    };
    cache.add_or_update_cluster_queue("cq", &s).unwrap();

    let huge = |name: &str| {
        WorkloadInfo::new("ns", name, "q", "cq").with_pod_set(
            PodSetResources::new("main", 2, vec![("memory", i64::MAX / 2 + 1)]).assign("memory", "f"),
        )
    };
    cache.admit_workload(huge("a")).unwrap();
    cache.admit_workload(huge("b")).unwrap();

    let cq = cache.cluster_queue("cq").unwrap();
    assert_eq!{cq.resource_groups()[0].flavors[0].resources["memory"].nominal, i64::MAX};
    assert_eq!{cq.usage().get("f", "memory"), Some(&i64::MAX)};
    assert!{!cq.is_borrowing()};

    cache.remove_workload("ns/a");
    assert_eq!{cache.cluster_queue("cq").unwrap().usage().get("f", "memory"), Some(&0)};
}
