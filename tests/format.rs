use serde_json::json;
use trial_assistant::store::format::format_hit;

#[test]
fn full_hit_is_flattened() {
    let record = format_hit(&json!({
        "_score": 7.5,
        "_source": {
            "nct_id": "NCT01234567",
            "brief_title": "Olaparib in BRCA Breast Cancer",
            "overall_status": "RECRUITING",
            "phase": "PHASE3",
            "enrollment": 420,
            "start_date": "2021-03-01",
            "conditions": [{ "name": "Breast Cancer" }, { "name": "BRCA1 Mutation" }],
            "sponsors": [
                { "name": "Academic Partner", "lead_or_collaborator": "collaborator" },
                { "name": "AstraZeneca", "lead_or_collaborator": "lead" }
            ],
            "facilities": [
                { "city": "Boston", "state": "Massachusetts", "country": "United States" },
                { "city": "Toronto", "state": "Ontario", "country": "Canada" },
                { "city": "Houston", "state": "Texas", "country": "United States" },
                { "city": "Milan", "country": "Italy" }
            ]
        },
        "highlight": { "brief_title": ["<mark>Olaparib</mark> in BRCA Breast Cancer"] }
    }));

    assert_eq!(record.nct_id.as_deref(), Some("NCT01234567"));
    assert_eq!(record.sponsor.as_deref(), Some("AstraZeneca"));
    assert_eq!(record.enrollment, Some(420));
    assert_eq!(record.score, Some(7.5));
    assert_eq!(record.conditions, ["Breast Cancer", "BRCA1 Mutation"]);
    assert_eq!(
        record.locations,
        [
            "Boston, Massachusetts, United States",
            "Toronto, Ontario, Canada",
            "Houston, Texas, United States"
        ]
    );
    assert_eq!(record.countries, ["United States", "Canada", "Italy"]);
    assert!(record.highlights.contains_key("brief_title"));
}

#[test]
fn sponsor_falls_back_to_first_named() {
    let record = format_hit(&json!({
        "_source": { "sponsors": [{ "name": "NCI" }, { "name": "Mayo Clinic" }] }
    }));
    assert_eq!(record.sponsor.as_deref(), Some("NCI"));
}

#[test]
fn missing_source_yields_empty_record() {
    let record = format_hit(&json!({ "_id": "x" }));
    assert!(record.nct_id.is_none());
    assert!(record.sponsor.is_none());
    assert!(record.locations.is_empty());
    assert!(record.countries.is_empty());
    assert!(record.highlights.is_empty());
}

#[test]
fn mistyped_fields_are_skipped() {
    let record = format_hit(&json!({
        "_source": {
            "enrollment": "85",
            "conditions": "Asthma",
            "sponsors": [],
            "facilities": [{ "city": 12 }, { "country": "France" }]
        }
    }));
    assert_eq!(record.enrollment, Some(85));
    assert!(record.conditions.is_empty());
    assert!(record.sponsor.is_none());
    assert_eq!(record.locations, ["France"]);
}
