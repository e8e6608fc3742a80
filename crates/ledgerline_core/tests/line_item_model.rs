use ledgerline_core::{LineItem, LineItemPatch, LineItemView, RowVersion};
use rust_decimal::Decimal;
use uuid::Uuid;

fn sample_patch() -> LineItemPatch {
    LineItemPatch {
        quantity: Decimal::from(10),
        price: "199.99".parse().unwrap(),
        discount: "5.5".parse().unwrap(),
        margin: Decimal::from(12),
        vat_rate: 20,
        calculate_excise: false,
        calculate_tax: true,
    }
}

#[test]
fn line_item_serialization_uses_expected_wire_fields() {
    let item_id = Uuid::parse_str("11111111-2222-4333-8444-555555555555").unwrap();
    let document_id = Uuid::parse_str("99999999-8888-4777-8666-555555555555").unwrap();
    let mut item = LineItem::new(document_id, 42, sample_patch());
    item.uuid = item_id;
    item.row_version = RowVersion::initial().next().next();
    item.created_at = 1_760_000_000_000;
    item.updated_at = 1_760_000_060_000;
    item.updated_by = Some("alice".to_string());

    let json = serde_json::to_value(&item).unwrap();
    assert_eq!(json["uuid"], item_id.to_string());
    assert_eq!(json["document_uuid"], document_id.to_string());
    assert_eq!(json["article_id"], 42);
    // Decimals travel as strings so precision survives the wire.
    assert_eq!(json["quantity"], "10");
    assert_eq!(json["price"], "199.99");
    assert_eq!(json["discount"], "5.5");
    assert_eq!(json["row_version"], 3);
    assert_eq!(json["is_deleted"], false);
    assert_eq!(json["updated_at"], 1_760_000_060_000_i64);
    assert_eq!(json["created_by"], serde_json::Value::Null);
    assert_eq!(json["updated_by"], "alice");

    let decoded: LineItem = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, item);
}

#[test]
fn view_renders_row_version_as_opaque_etag() {
    let mut item = LineItem::new(Uuid::new_v4(), 7, sample_patch());
    item.row_version = RowVersion::initial().next().next();

    let view = LineItemView::from(item.clone());
    assert_eq!(view.etag, item.row_version.encode());

    let json = serde_json::to_value(&view).unwrap();
    // Callers only ever see the encoded token, never the raw counter.
    assert_eq!(json["etag"], "AAAAAAAAAAM=");
    assert!(json.get("row_version").is_none());
    assert_eq!(json["uuid"], item.uuid.to_string());
    assert_eq!(json["price"], "199.99");

    let decoded: LineItemView = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, view);
}

#[test]
fn patch_deserializes_decimal_fields_from_strings() {
    let value = serde_json::json!({
        "quantity": "2.5",
        "price": "19.90",
        "discount": "0",
        "margin": "1.25",
        "vat_rate": 9,
        "calculate_excise": false,
        "calculate_tax": true
    });

    let patch: LineItemPatch = serde_json::from_value(value).unwrap();
    assert_eq!(patch.quantity, "2.5".parse::<Decimal>().unwrap());
    assert_eq!(patch.price, "19.90".parse::<Decimal>().unwrap());
    assert_eq!(patch.margin, "1.25".parse::<Decimal>().unwrap());
    assert_eq!(patch.vat_rate, 9);
    assert!(patch.validate().is_ok());
}
