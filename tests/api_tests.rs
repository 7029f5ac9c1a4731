#![allow(clippy::unwrap_used)]
#![allow(clippy::float_cmp)]

mod common;

use common::{
    error_detail, formula_body, formula_resource, ingredient_body, share_links,
    start_test_server,
};
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};

#[tokio::test]
async fn test_health_check() {
    let server = start_test_server().await;

    let resp = server.get("/health").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() {
    let server = start_test_server().await;

    let resp = server
        .client
        .get(server.url("/health"))
        .header("x-request-id", "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "req-42");

    let resp = server.get("/health").await;
    let generated = resp.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(generated).is_ok());
}

#[tokio::test]
async fn test_ingredient_crud() {
    let server = start_test_server().await;

    // Create
    let resp = server
        .post_json("/ingredients", ingredient_body("  Chamomile Flower ", "g", 0.12))
        .await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["type"], "ingredient");
    assert_eq!(body["data"]["attributes"]["name"], "Chamomile Flower");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    // Get
    let resp = server.get(&format!("/ingredients/{id}")).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["attributes"]["unit"], "g");

    // Patch keeps absent fields
    let resp = server
        .patch_json(
            &format!("/ingredients/{id}"),
            json!({ "data": { "type": "ingredient", "id": id, "attributes": { "cost_per_unit": 0.2 } } }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["attributes"]["cost_per_unit"], 0.2);
    assert_eq!(body["data"]["attributes"]["name"], "Chamomile Flower");

    // List
    let resp = server.get("/ingredients?page=1&per_page=5").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["meta"]["total_count"], 1);
    assert_eq!(body["meta"]["page_size"], 5);

    // Delete
    let resp = server.delete(&format!("/ingredients/{id}")).await;
    assert_eq!(resp.status(), 204);
    let resp = server.get(&format!("/ingredients/{id}")).await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["errors"][0]["status"], "404");
    assert!(body["errors"][0]["error_id"].is_string());
}

#[tokio::test]
async fn test_duplicate_ingredient_name_conflicts() {
    let server = start_test_server().await;
    server.create_ingredient("Honey").await;

    let resp = server
        .post_json("/ingredients", ingredient_body("Honey", "kg", 3.0))
        .await;
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn test_referenced_ingredient_cannot_be_deleted() {
    let server = start_test_server().await;
    let honey = server.create_ingredient("Honey").await;
    server
        .create_formula("Honey Syrup", None, &[(honey.as_str(), 100.0)])
        .await;

    let resp = server.delete(&format!("/ingredients/{honey}")).await;
    assert_eq!(resp.status(), 409);
    assert_eq!(
        error_detail(resp).await,
        "Cannot delete ingredient: it is used in 1 formula(s)"
    );
    assert_eq!(server.get(&format!("/ingredients/{honey}")).await.status(), 200);
}

#[tokio::test]
async fn test_rejects_wrong_type_and_malformed_bodies() {
    let server = start_test_server().await;

    let resp = server
        .post_json(
            "/ingredients",
            json!({ "data": { "type": "formula", "attributes": { "name": "X", "unit": "kg", "cost_per_unit": 1.0 } } }),
        )
        .await;
    assert_eq!(resp.status(), 400);
    assert!(error_detail(resp).await.contains("expected 'ingredient'"));

    let resp = server
        .client
        .post(server.url("/ingredients"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["errors"][0]["title"], "Bad Request");

    let resp = server.get("/ingredients?page=0").await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_formula_lifecycle() {
    let server = start_test_server().await;
    let chamomile = server.create_ingredient("Chamomile Flower").await;
    let honey = server.create_ingredient("Honey").await;

    let resp = server
        .post_json(
            "/formulas",
            formula_body(
                "Calming Chamomile Tea",
                Some("A gentle evening blend"),
                250.0,
                &[(chamomile.as_str(), 70.0), (honey.as_str(), 30.0)],
            ),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let links = body["data"]["relationships"]["ingredients"]["data"]
        .as_array()
        .unwrap();
    assert_eq!(links.len(), 2);
    assert!(links.iter().any(|l| l["id"] == chamomile.as_str() && l["meta"]["percentage"] == 70.0));

    // Unpaginated list returns everything with only a total
    let resp = server.get("/formulas").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["meta"]["total_count"], 1);
    assert!(body["meta"].get("page_count").is_none());

    // By ingredient
    let resp = server.get(&format!("/formulas/by-ingredient/{honey}")).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"][0]["id"], id.as_str());

    // Replacing the composition drops honey
    let resp = server
        .patch_json(
            &format!("/formulas/{id}"),
            json!({
                "data": {
                    "type": "formula",
                    "id": id,
                    "attributes": { "mass": 500.0 },
                    "relationships": share_links(&[(chamomile.as_str(), 100.0)])
                }
            }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["attributes"]["mass"], 500.0);
    assert_eq!(body["data"]["attributes"]["name"], "Calming Chamomile Tea");

    let resp = server.get(&format!("/formulas/by-ingredient/{honey}")).await;
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"].as_array().unwrap().is_empty());

    let resp = server.delete(&format!("/formulas/{id}")).await;
    assert_eq!(resp.status(), 204);
    assert_eq!(server.delete(&format!("/formulas/{id}")).await.status(), 404);
}

#[tokio::test]
async fn test_formula_round_trips_composition_and_mass() {
    let server = start_test_server().await;
    let first = server.create_ingredient("Ingredient A").await;
    let second = server.create_ingredient("Ingredient B").await;
    let id = server
        .create_formula("Split", None, &[(first.as_str(), 60.0), (second.as_str(), 40.0)])
        .await;

    let resp = server.get(&format!("/formulas/{id}")).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["attributes"]["mass"], 100.0);

    let mut shares: Vec<(String, f64)> = body["data"]["relationships"]["ingredients"]["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|link| {
            assert_eq!(link["type"], "ingredient");
            (
                link["id"].as_str().unwrap().to_string(),
                link["meta"]["percentage"].as_f64().unwrap(),
            )
        })
        .collect();
    shares.sort_by(|a, b| a.0.cmp(&b.0));
    let mut expected = vec![(first, 60.0), (second, 40.0)];
    expected.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(shares, expected);
}

#[tokio::test]
async fn test_formula_composition_is_validated() {
    let server = start_test_server().await;
    let honey = server.create_ingredient("Honey").await;

    let resp = server
        .post_json("/formulas", formula_body("Short", None, 100.0, &[(honey.as_str(), 90.0)]))
        .await;
    assert_eq!(resp.status(), 400);

    let resp = server
        .post_json(
            "/formulas",
            formula_body("Ghost", None, 100.0, &[(honey.as_str(), 50.0), ("missing-id", 50.0)]),
        )
        .await;
    assert_eq!(resp.status(), 400);
    assert_eq!(error_detail(resp).await, "Invalid ingredient ID(s): missing-id");

    let resp = server
        .post_json("/formulas", formula_body("Weightless", None, 0.0, &[(honey.as_str(), 100.0)]))
        .await;
    assert_eq!(resp.status(), 400);

    // Within the rounding tolerance
    let resp = server
        .post_json(
            "/formulas",
            formula_body("Rounded", None, 100.0, &[(honey.as_str(), 99.995)]),
        )
        .await;
    assert_eq!(resp.status(), 201);
}

#[tokio::test]
async fn test_bulk_create_is_atomic() {
    let server = start_test_server().await;

    let resp = server
        .post_json(
            "/bulk/ingredients",
            json!({
                "data": [
                    { "type": "ingredient", "attributes": { "name": "Sugar", "unit": "kg", "cost_per_unit": 1.0 } },
                    { "type": "ingredient", "attributes": { "name": "  ", "unit": "kg", "cost_per_unit": 1.0 } }
                ]
            }),
        )
        .await;
    assert_eq!(resp.status(), 400);

    let body: Value = server.get("/ingredients").await.json().await.unwrap();
    assert_eq!(body["meta"]["total_count"], 0);

    let resp = server
        .post_json(
            "/bulk/ingredients",
            json!({
                "data": [
                    { "type": "ingredient", "attributes": { "name": "Sugar", "unit": "kg", "cost_per_unit": 1.0 } },
                    { "type": "ingredient", "attributes": { "name": "Salt", "unit": "kg", "cost_per_unit": 0.5 } }
                ]
            }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["meta"]["total_count"], 2);
    assert_eq!(body["data"][0]["attributes"]["name"], "Sugar");
    assert_eq!(body["data"][1]["attributes"]["name"], "Salt");
}

#[tokio::test]
async fn test_bulk_formula_update_and_delete() {
    let server = start_test_server().await;
    let honey = server.create_ingredient("Honey").await;
    let first = server.create_formula("Syrup A", None, &[(honey.as_str(), 100.0)]).await;
    let second = server.create_formula("Syrup B", None, &[(honey.as_str(), 100.0)]).await;

    // One bad id rolls back the whole update
    let resp = server
        .patch_json(
            "/bulk/formulas",
            json!({
                "data": [
                    { "type": "formula", "id": first, "attributes": { "mass": 1.0 } },
                    { "type": "formula", "id": "nope", "attributes": { "mass": 2.0 } }
                ]
            }),
        )
        .await;
    assert_eq!(resp.status(), 404);
    let body: Value = server.get(&format!("/formulas/{first}")).await.json().await.unwrap();
    assert_eq!(body["data"]["attributes"]["mass"], 100.0);

    let resp = server
        .client
        .delete(server.url("/bulk/formulas"))
        .json(&json!({ "data": [ { "type": "formula", "id": first }, { "type": "formula", "id": second } ] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["meta"]["deleted_count"], 2);

    // Honey is free again
    assert_eq!(server.delete(&format!("/ingredients/{honey}")).await.status(), 204);
}

#[tokio::test]
async fn test_bulk_formula_create() {
    let server = start_test_server().await;
    let honey = server.create_ingredient("Honey").await;

    let resp = server
        .post_json(
            "/bulk/formulas",
            json!({
                "data": [
                    formula_resource("Syrup A", None, 100.0, &[(honey.as_str(), 100.0)]),
                    formula_resource("Syrup B", Some("thicker"), 50.0, &[(honey.as_str(), 100.0)])
                ]
            }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["meta"]["total_count"], 2);
}

#[tokio::test]
async fn test_ingredient_search() {
    let server = start_test_server().await;
    server.create_ingredient("Chamomile Flower").await;
    server.create_ingredient("Honey").await;

    let resp = server.get("/search/ingredients?q=CHAMO").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["meta"]["search_term"], "CHAMO");

    let resp = server.get("/search/ingredients?search=kg").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["meta"]["total_count"], 2);

    assert_eq!(server.get("/search/ingredients").await.status(), 400);
}

#[tokio::test]
async fn test_ingredient_search_folds_accented_case() {
    let server = start_test_server().await;
    server.create_ingredient("Érable").await;
    server.create_ingredient("Honey").await;

    let resp = server.get("/search/ingredients?q=%C3%89RABLE").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["meta"]["total_count"], 1);
    assert_eq!(body["data"][0]["attributes"]["name"], "Érable");

    let resp = server.get("/ingredients?name=%C3%A9rable").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["meta"]["total_count"], 1);
}

#[tokio::test]
async fn test_pages_past_the_end_are_empty() {
    let server = start_test_server().await;
    let tea = server.create_ingredient("Black Tea").await;
    server
        .create_formula("Morning Tea", None, &[(tea.as_str(), 100.0)])
        .await;

    for path in [
        "/search/formulas?q=tea&page=1000000000000000000",
        "/search/formulas?q=tea&fuzzy=true&page=18446744073709551615&size=100",
        "/search/ingredients?q=tea&page=1000000000000000000",
        "/ingredients?page=1000000000000000000",
        "/ingredients?name=tea&page=1000000000000000000",
        "/formulas?page=1000000000000000000&size=100",
        "/invoices?page=1000000000000000000",
    ] {
        let resp = server.get(path).await;
        assert_eq!(resp.status(), 200, "{path}");
        let body: Value = resp.json().await.unwrap();
        assert!(body["data"].as_array().unwrap().is_empty(), "{path}");
    }
}

#[tokio::test]
async fn test_overlong_formula_query_is_rejected() {
    let server = start_test_server().await;
    let tea = server.create_ingredient("Black Tea").await;
    server
        .create_formula("Morning Tea", None, &[(tea.as_str(), 100.0)])
        .await;

    let long = "a".repeat(55_000);
    let resp = server
        .client
        .get(server.url("/search/formulas"))
        .query(&[("q", long.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert!(error_detail(resp).await.contains("cannot exceed"));

    let resp = server.get("/search/formulas?q=tea").await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_formula_search_ranks_and_pages() {
    let server = start_test_server().await;
    let tea = server.create_ingredient("Black Tea").await;

    server
        .create_formula("Morning Tea", Some("Strong black tea for mornings"), &[(tea.as_str(), 100.0)])
        .await;
    server
        .create_formula("Evening Blend", Some("Tea with lavender"), &[(tea.as_str(), 100.0)])
        .await;
    server
        .create_formula("Iced Tea", None, &[(tea.as_str(), 100.0)])
        .await;
    server
        .create_formula("Lemonade", Some("Sour and sweet"), &[(tea.as_str(), 100.0)])
        .await;

    let resp = server.get("/search/formulas?q=tea&page=1&size=2").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["meta"]["total_count"], 3);
    assert_eq!(body["meta"]["page_count"], 2);
    assert_eq!(body["meta"]["search_term"], "tea");
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let page_two: Value = server
        .get("/search/formulas?q=tea&page=2&size=2")
        .await
        .json()
        .await
        .unwrap();
    let page_two = page_two["data"].as_array().unwrap();
    assert_eq!(page_two.len(), 1);
    let mut seen: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .chain(page_two.iter())
        .map(|f| f["attributes"]["name"].as_str().unwrap())
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, vec!["Evening Blend", "Iced Tea", "Morning Tea"]);

    assert_eq!(server.get("/search/formulas?q=%20").await.status(), 400);
    assert_eq!(server.get("/search/formulas?q=tea&size=101").await.status(), 400);
}

#[tokio::test]
async fn test_fuzzy_search_with_included_ingredients() {
    let server = start_test_server().await;
    let chamomile = server.create_ingredient("Chamomile Flower").await;
    let honey = server.create_ingredient("Honey").await;
    server
        .create_formula(
            "Calming Chamomile Tea",
            Some("A gentle evening blend"),
            &[(chamomile.as_str(), 70.0), (honey.as_str(), 30.0)],
        )
        .await;

    let body: Value = server
        .get("/search/formulas?q=calming%20chamomlie%20tea")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["meta"]["total_count"], 0);

    let resp = server
        .get("/search/formulas?q=calming%20chamomlie%20tea&fuzzy=true&include=ingredients")
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["meta"]["total_count"], 1);
    assert_eq!(body["data"][0]["attributes"]["name"], "Calming Chamomile Tea");
    let included = body["included"].as_array().unwrap();
    assert_eq!(included.len(), 2);
    assert!(included.iter().all(|i| i["type"] == "ingredient"));

    let resp = server
        .get("/search/formulas?q=tea&include=suppliers")
        .await;
    assert_eq!(resp.status(), 400);
}

fn invoice_form(pdf: &[u8]) -> Form {
    Form::new()
        .text("date", "2024-03-15")
        .text("supplier", "Herbal Supply Co")
        .text("ingredients", r#"[{"name": "Chamomile Flower", "quantity": 5}]"#)
        .part(
            "file",
            Part::bytes(pdf.to_vec())
                .file_name("invoice.pdf")
                .mime_str("application/pdf")
                .unwrap(),
        )
}

#[tokio::test]
async fn test_invoice_upload_download_delete() {
    let server = start_test_server().await;
    let pdf = b"%PDF-1.4 test invoice";

    let resp = server
        .client
        .post(server.url("/invoices"))
        .multipart(invoice_form(pdf))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["type"], "invoice");
    assert_eq!(body["data"]["attributes"]["date"], "2024-03-15");
    assert_eq!(
        body["data"]["relationships"]["ingredients"]["data"][0]["quantity"],
        5
    );
    let pdf_path = body["data"]["attributes"]["pdf_path"].as_str().unwrap().to_string();
    assert!(server.upload_dir.join(&pdf_path).exists());

    let resp = server.get(&format!("/invoices/{id}/pdf")).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/pdf");
    assert_eq!(resp.bytes().await.unwrap().as_ref(), pdf);

    let resp = server
        .patch_json(
            &format!("/invoices/{id}"),
            json!({ "data": { "type": "invoice", "id": id, "attributes": { "supplier": "Bee Farm" } } }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["attributes"]["supplier"], "Bee Farm");
    assert_eq!(body["data"]["attributes"]["date"], "2024-03-15");

    let body: Value = server.get("/invoices").await.json().await.unwrap();
    assert_eq!(body["meta"]["total_count"], 1);

    assert_eq!(server.delete(&format!("/invoices/{id}")).await.status(), 204);
    assert!(!server.upload_dir.join(&pdf_path).exists());
    assert_eq!(server.get(&format!("/invoices/{id}")).await.status(), 404);
}

#[tokio::test]
async fn test_invoice_upload_requires_every_field() {
    let server = start_test_server().await;

    let form = Form::new()
        .text("date", "2024-03-15")
        .text("supplier", "Herbal Supply Co")
        .text("ingredients", "[]");
    let resp = server
        .client
        .post(server.url("/invoices"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(error_detail(resp).await, "Missing form field 'file'");

    let form = invoice_form(b"%PDF").text("date", "15/03/2024");
    let resp = server
        .client
        .post(server.url("/invoices"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body: Value = server.get("/invoices").await.json().await.unwrap();
    assert_eq!(body["meta"]["total_count"], 0);
}
