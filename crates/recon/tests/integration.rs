use pricesync_recon::model::{PriceColumnChoice, UpdateReason};
use pricesync_recon::{reconcile, CellValue, PriceSyncConfig, SourceTable, TargetRow, TargetSheet, UpdatePlan};

fn text(s: &str) -> CellValue {
    CellValue::Text(s.into())
}

fn num(n: f64) -> CellValue {
    CellValue::Number(n)
}

fn source() -> SourceTable {
    SourceTable {
        name: "Lista001.xlsx".into(),
        headers: vec![
            "Cod.Producto".into(),
            "Descripcion".into(),
            "Precio Costo".into(),
            "Precio Venta".into(),
        ],
        rows: vec![
            vec![text("A1"), text("Tornillo"), num(5.0), num(10.5)],
            vec![text("B2"), text("Tuerca"), num(1.0), num(2.0)],
            vec![num(3003.0), text("Arandela"), num(0.1), num(0.25)],
            vec![text("D4"), text("Clavo"), num(0.2), text("N/A")],
            vec![text("B2"), text("Tuerca x100"), num(1.0), num(2.5)],
        ],
    }
}

fn target() -> TargetSheet {
    let rows = vec![
        (text("A1"), num(9.0)),
        (text("B2"), num(2.5)),
        (text("3003"), text("N/A")),
        (text("Z9"), num(99.0)),
        (CellValue::Empty, num(1.0)),
        (text("D4"), num(7.0)),
    ];
    TargetSheet {
        name: "001".into(),
        header: vec![text("Cod.Producto"), text("Descripcion"), text("Precio Venta")],
        rows: rows
            .into_iter()
            .enumerate()
            .map(|(i, (code, price))| TargetRow {
                number: i as u32 + 2,
                cells: vec![code, text("item"), price],
            })
            .collect(),
    }
}

/// Apply a plan to the in-memory sheet the way the xlsx patcher applies it to the file.
fn apply(sheet: &mut TargetSheet, plan: &UpdatePlan) {
    for update in &plan.updates {
        let row = sheet
            .rows
            .iter_mut()
            .find(|r| r.number == update.row)
            .expect("planned row exists");
        if row.cells.len() <= update.column {
            row.cells.resize(update.column + 1, CellValue::Empty);
        }
        row.cells[update.column] = CellValue::Number(update.new_price);
    }
}

#[test]
fn scenarios_from_a_catalog_run() {
    let config = PriceSyncConfig::default();
    let result = reconcile(&config, &source(), &target()).unwrap();

    // Two price-like headers; "Precio Venta" is preferred over the first one
    assert_eq!(result.source.price_column.name, "Precio Venta");
    assert!(matches!(result.source.price_column.choice, PriceColumnChoice::Preferred { .. }));

    let stats = &result.source.stats;
    assert_eq!(stats.rows_read, 5);
    assert_eq!(stats.prices_loaded, 3);
    assert_eq!(stats.rows_without_price, 1);
    assert_eq!(stats.duplicate_codes, 1);

    let counts = &result.plan.counts;
    assert_eq!(counts.rows_scanned, 6);
    // A1 differs, 3003 holds "N/A"
    assert_eq!(counts.updated, 2);
    // B2 already 2.5 after the duplicate resolved to the last row
    assert_eq!(counts.unchanged, 1);
    // Z9, empty code, D4 (its source price was unusable)
    assert_eq!(counts.not_found, 3);

    let cells: Vec<(&str, f64, UpdateReason)> = result
        .plan
        .updates
        .iter()
        .map(|u| (u.cell.as_str(), u.new_price, u.reason))
        .collect();
    assert_eq!(
        cells,
        vec![("C2", 10.5, UpdateReason::Differs), ("C4", 0.25, UpdateReason::Unparsable)]
    );
}

#[test]
fn second_run_is_idempotent() {
    let config = PriceSyncConfig::default();
    let mut sheet = target();

    let first = reconcile(&config, &source(), &sheet).unwrap();
    assert!(first.plan.counts.updated > 0);
    apply(&mut sheet, &first.plan);

    let second = reconcile(&config, &source(), &sheet).unwrap();
    assert_eq!(second.plan.counts.updated, 0);
    assert!(second.plan.updates.is_empty());
    assert_eq!(
        second.plan.counts.unchanged,
        first.plan.counts.unchanged + first.plan.counts.updated
    );
}

#[test]
fn config_from_toml_drives_columns() {
    let config = PriceSyncConfig::from_toml(
        r#"
key_column = "SKU"

[source]
price_column = "Costo"

[target]
sheet = "Catalogo"
price_column = "PVP"
"#,
    )
    .unwrap();

    let source = SourceTable {
        name: "supplier.csv".into(),
        headers: vec!["SKU".into(), "Precio".into(), "Costo".into()],
        rows: vec![vec![text("X-1"), num(100.0), num(80.0)]],
    };
    let target = TargetSheet {
        name: "Catalogo".into(),
        header: vec![text("PVP"), CellValue::Empty, text("SKU")],
        rows: vec![TargetRow { number: 2, cells: vec![num(75.0), CellValue::Empty, text("X-1")] }],
    };

    let result = reconcile(&config, &source, &target).unwrap();
    assert_eq!(result.source.price_column.choice, PriceColumnChoice::Explicit);
    assert_eq!(result.plan.updates.len(), 1);
    assert_eq!(result.plan.updates[0].cell, "A2");
    assert_eq!(result.plan.updates[0].new_price, 80.0);
}
