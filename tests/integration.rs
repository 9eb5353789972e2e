//! Integration tests for the RFM pipeline and the marketing scorer.

use chrono::NaiveDate;
use polars::prelude::*;

use rfmforge::carts::{enrich_and_score, CART_COLS};
use rfmforge::format::parse_comma_decimal;
use rfmforge::pipeline::{sort_by, FINAL_COLS};
use rfmforge::records::{Address, RawCustomer};
use rfmforge::{MarketingScorer, RfmProcessor, ScoringThresholds, SortBy};

fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn customer(id: i64, email: &str, first: &str, last: &str, postcode: &str) -> RawCustomer {
    RawCustomer {
        id,
        email: email.to_string(),
        firstname: Some(first.to_string()),
        lastname: Some(last.to_string()),
        addresses: vec![Address {
            telephone: Some("291-555-0000".to_string()),
            postcode: Some(postcode.to_string()),
        }],
        taxvat: Some("20-12345678-9".to_string()),
        created_at: Some("2022-03-01 09:00:00".to_string()),
    }
}

/// One customer with two eligible orders, one flagged Factura A; one
/// customer whose only order predates the minimum year; one customer with
/// a single same-day order.
fn sample_customers() -> Vec<RawCustomer> {
    vec![
        customer(1, "Ana@Example.com", "Ana", "Prieto", "8000"),
        customer(2, "bob@example.com", "Bob", "Keller", "1425"),
        customer(3, "cleo@example.com", "Cleo", "Funes", "8000HKD"),
    ]
}

fn sample_orders() -> DataFrame {
    df!(
        "ID" => ["1001", "1002", "2001", "3001", "1003"],
        "Email" => [
            "ANA@example.com",
            "ana@example.com",
            "bob@example.com",
            "cleo@example.com",
            "ana@example.com",
        ],
        "Purchase Date" => [
            "2024-05-01 10:00:00",
            "2024-06-10 00:00:00",
            "2023-11-20 12:00:00",
            "2024-06-15 08:00:00",
            "2024-06-01 00:00:00",
        ],
        "Grand Total" => [500_000.0, 600_000.0, 90_000.0, 75_000.0, 10_000.0],
        "Status" => ["processing", "processing", "processing", "processing", "canceled"],
        "Payment_Method" => [
            "Factura A - Transferencia",
            "Tarjeta de crédito",
            "Tarjeta de crédito",
            "Tarjeta de débito",
            "Tarjeta de crédito",
        ],
    )
    .unwrap()
}

fn sample_catalog() -> DataFrame {
    df!(
        "sku" => ["777", "123", "500"],
        "product_name" => ["Porcelanato Beige 60x60", "Cable Unipolar 2.5mm", "Pintura Látex 20L"],
        "categories" => [
            "Root/Pisos/Porcelanato",
            "Root/Electricidad/Cables",
            "Root/Pinturas",
        ],
        "brand" => ["Ilva", "Prysmian", "Alba"],
    )
    .unwrap()
}

fn sample_items() -> DataFrame {
    df!(
        "order_id" => ["1001", "1002", "3001"],
        "customer_email" => ["ana@example.com", "ana@example.com", "cleo@example.com"],
        "sku" => ["777", "1 23", "500"],
        "qty_ordered" => [3.0, 1.0, 2.0],
        "row_total" => [450_000.0, 50_000.0, 75_000.0],
    )
    .unwrap()
}

fn run_pipeline() -> DataFrame {
    let processor = RfmProcessor::new(2024, reference_date());
    processor
        .process(
            &sample_customers(),
            &sample_orders(),
            &sample_catalog(),
            &sample_items(),
        )
        .unwrap()
}

fn str_cell(df: &DataFrame, column: &str, row: usize) -> String {
    df.column(column)
        .unwrap()
        .str()
        .unwrap()
        .get(row)
        .unwrap()
        .to_string()
}

fn i64_cell(df: &DataFrame, column: &str, row: usize) -> i64 {
    df.column(column).unwrap().i64().unwrap().get(row).unwrap()
}

fn row_for(df: &DataFrame, email: &str) -> usize {
    let emails = df.column("Email").unwrap().str().unwrap();
    (0..df.height())
        .find(|&i| emails.get(i) == Some(email))
        .unwrap_or_else(|| panic!("no row for {email}"))
}

#[test]
fn test_end_to_end_rfm_row() {
    let df = run_pipeline();
    let ana = row_for(&df, "ana@example.com");

    assert_eq!(str_cell(&df, "Name", ana), "Ana Prieto");
    assert_eq!(str_cell(&df, "LTV_Gasto_Total", ana), "1.100.000,00");
    assert_eq!(i64_cell(&df, "Frecuencia", ana), 2);
    assert_eq!(str_cell(&df, "Tiene_Factura_A", ana), "Sí");
    assert_eq!(str_cell(&df, "Categoria_Preferida", ana), "Porcelanato");
    assert_eq!(str_cell(&df, "Es_Bahia_Blanca", ana), "Si");
    assert_eq!(i64_cell(&df, "Recencia_Dias", ana), 5);
    assert_eq!(str_cell(&df, "Recencia_Fecha", ana), "10/06/2024");
    assert_eq!(str_cell(&df, "Primera_Compra_Fecha", ana), "01/05/2024");
    assert_eq!(i64_cell(&df, "Dias_Como_Cliente", ana), 45);
    assert_eq!(str_cell(&df, "Cliente_Desde", ana), "01/03/2022");
    assert_eq!(str_cell(&df, "Ultimo_Trimestre_Compra", ana), "2024-Q2");
    // one purchase on a Wednesday, one on a Monday: the earliest weekday
    // slot wins the tie
    assert_eq!(str_cell(&df, "Dia_Semana_Max_Frec", ana), "Lunes");
    // the cancelled 10k order must not leak into any aggregate
    assert_eq!(
        str_cell(&df, "Historial_Ordenes_Mapeo", ana),
        "1002 (600.000,00 processing); 1001 (500.000,00 processing)"
    );
    assert_eq!(str_cell(&df, "Producto_Favorito_SKU", ana), "00777");
    assert_eq!(
        str_cell(&df, "Producto_Favorito_Nombre", ana),
        "Porcelanato Beige 60x60"
    );
    assert_eq!(
        str_cell(&df, "Lista_Categorias_Compradas", ana),
        "Porcelanato, Cables"
    );
    assert_eq!(str_cell(&df, "Marca_Preferida", ana), "Ilva");
}

#[test]
fn test_output_schema_is_fixed() {
    let df = run_pipeline();
    assert_eq!(df.get_column_names(), FINAL_COLS.to_vec());
}

#[test]
fn test_customers_without_eligible_orders_are_excluded() {
    let df = run_pipeline();
    // bob's only order predates the minimum year
    let emails = df.column("Email").unwrap().str().unwrap();
    assert!((0..df.height()).all(|i| emails.get(i) != Some("bob@example.com")));
    assert_eq!(df.height(), 2);
}

#[test]
fn test_frequency_and_ltv_hold_for_every_customer() {
    let df = run_pipeline();
    let expected = [
        ("ana@example.com", 2i64, 1_100_000.0),
        ("cleo@example.com", 1, 75_000.0),
    ];
    for (email, frequency, ltv) in expected {
        let row = row_for(&df, email);
        assert_eq!(i64_cell(&df, "Frecuencia", row), frequency, "{email}");
        let parsed = parse_comma_decimal(&str_cell(&df, "LTV_Gasto_Total", row));
        assert!((parsed - ltv).abs() < 0.005, "{email}: {parsed} != {ltv}");
    }
}

#[test]
fn test_single_order_customer_edge_cases() {
    let df = run_pipeline();
    let cleo = row_for(&df, "cleo@example.com");

    // the interval between purchases is undefined, not zero
    assert_eq!(str_cell(&df, "Tiempo_Promedio_Entre_Compras", cleo), "N/A");
    // a same-day first purchase yields one day of tenure, not zero
    assert_eq!(i64_cell(&df, "Dias_Como_Cliente", cleo), 1);
    assert_eq!(i64_cell(&df, "Recencia_Dias", cleo), 0);
}

#[test]
fn test_pipeline_is_deterministic() {
    let first = run_pipeline();
    let second = run_pipeline();
    assert!(first.equals(&second));
}

#[test]
fn test_sorting_by_ltv_parses_formatted_currency() {
    let df = sort_by(&run_pipeline(), SortBy::Ltv).unwrap();
    assert_eq!(str_cell(&df, "Email", 0), "ana@example.com");
    assert_eq!(str_cell(&df, "Email", 1), "cleo@example.com");
}

#[test]
fn test_scoring_the_rfm_population() {
    let df = run_pipeline();
    let scorer = MarketingScorer::default();
    let scored = scorer.process(&df).unwrap();

    let ana = row_for(&scored, "ana@example.com");
    // 30 for the 1.1M lifetime value, 10 for two orders, 20 for the
    // 5-day recency, no cart component
    assert_eq!(i64_cell(&scored, "Score_Intencion", ana), 60);
    assert_eq!(str_cell(&scored, "Segmento", ana), "Media");
    assert_eq!(str_cell(&scored, "Accion_Sugerida", ana), "Email remarketing");
    // the invoice flag alone forces VIP
    assert_eq!(str_cell(&scored, "Tipo_Cliente", ana), "VIP");

    let cleo = row_for(&scored, "cleo@example.com");
    // 10 value + 10 frequency + 20 recency
    assert_eq!(i64_cell(&scored, "Score_Intencion", cleo), 40);
    assert_eq!(str_cell(&scored, "Segmento", cleo), "Baja");
    assert_eq!(str_cell(&scored, "Tipo_Cliente", cleo), "Nuevo");
}

#[test]
fn test_scoring_with_relaxed_frequency_threshold() {
    let df = run_pipeline();
    let scorer = MarketingScorer::new(ScoringThresholds {
        medium_frequency: 2,
        ..ScoringThresholds::default()
    });
    let scored = scorer.process(&df).unwrap();

    let ana = row_for(&scored, "ana@example.com");
    // two orders now reach the medium frequency tier
    assert_eq!(i64_cell(&scored, "Score_Intencion", ana), 70);
    assert_eq!(str_cell(&scored, "Segmento", ana), "Alta");
    assert_eq!(
        str_cell(&scored, "Accion_Sugerida", ana),
        "WhatsApp + Cupón personalizado"
    );
}

#[test]
fn test_scorer_is_idempotent_over_scored_table() {
    let scorer = MarketingScorer::default();
    let once = scorer.process(&run_pipeline()).unwrap();
    let twice = scorer.process(&once).unwrap();
    assert!(once.equals(&twice));
}

#[test]
fn test_abandoned_carts_merge_with_rfm_fields() {
    let rfm = run_pipeline();
    let carts = df!(
        "Email" => ["ANA@EXAMPLE.COM", "nobody@example.com"],
        "Products" => ["Porcelanato Beige 60x60", "Cable Unipolar 2.5mm"],
        "Quantity" => [4i64, 1],
        "Subtotal" => ["$320,000.00", "$45,000.00"],
        "Created" => ["2024-06-12 09:00:00", "2024-06-13 18:00:00"],
        "Updated" => ["2024-06-13 10:00:00", "2024-06-14 09:00:00"],
    )
    .unwrap();

    let scored = enrich_and_score(&carts, &rfm, &MarketingScorer::default()).unwrap();
    assert_eq!(scored.get_column_names(), CART_COLS.to_vec());

    let ana = row_for(&scored, "ana@example.com");
    // 30 value + 10 frequency + 20 recency + 20 for the 320k cart
    assert_eq!(i64_cell(&scored, "Score_Intencion", ana), 80);
    assert_eq!(str_cell(&scored, "Segmento", ana), "Alta");
    assert_eq!(str_cell(&scored, "Tipo_Cliente", ana), "VIP");
    assert_eq!(str_cell(&scored, "Categoria_Preferida", ana), "Porcelanato");

    let nobody = row_for(&scored, "nobody@example.com");
    assert_eq!(i64_cell(&scored, "Score_Intencion", nobody), 0);
    assert_eq!(str_cell(&scored, "Tipo_Cliente", nobody), "Nuevo");
    assert_eq!(str_cell(&scored, "Tiene_Factura_A", nobody), "No");

    // most recently updated cart first
    assert_eq!(str_cell(&scored, "Email", 0), "nobody@example.com");
}

#[test]
fn test_pipeline_over_csv_exports() {
    use std::io::Write;
    use tempfile::NamedTempFile;

    let mut orders_file = NamedTempFile::new().unwrap();
    writeln!(orders_file, "ID,Email,Purchase Date,Grand Total,Status,Payment_Method").unwrap();
    writeln!(
        orders_file,
        "1001,ana@example.com,2024-05-01 10:00:00,500000,processing,Factura A - Transferencia"
    )
    .unwrap();
    writeln!(
        orders_file,
        "1002,ana@example.com,2024-06-10 00:00:00,600000,processing,Tarjeta"
    )
    .unwrap();

    let mut catalog_file = NamedTempFile::new().unwrap();
    writeln!(catalog_file, "sku,product_name,categories,brand").unwrap();
    writeln!(
        catalog_file,
        "777,Porcelanato Beige 60x60,Root/Pisos/Porcelanato,Ilva"
    )
    .unwrap();

    let mut items_file = NamedTempFile::new().unwrap();
    writeln!(items_file, "order_id,customer_email,sku,qty_ordered,row_total").unwrap();
    writeln!(items_file, "1001,ana@example.com,777,3,450000").unwrap();

    let read = |path: &std::path::Path| {
        CsvReadOptions::default()
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .unwrap()
            .finish()
            .unwrap()
    };
    let orders = read(orders_file.path());
    let catalog = read(catalog_file.path());
    let items = read(items_file.path());

    let processor = RfmProcessor::new(2024, reference_date());
    let df = processor
        .process(&sample_customers(), &orders, &catalog, &items)
        .unwrap();

    let ana = row_for(&df, "ana@example.com");
    assert_eq!(i64_cell(&df, "Frecuencia", ana), 2);
    assert_eq!(str_cell(&df, "LTV_Gasto_Total", ana), "1.100.000,00");
    assert_eq!(str_cell(&df, "Categoria_Preferida", ana), "Porcelanato");
    assert_eq!(str_cell(&df, "Tiene_Factura_A", ana), "Sí");
}

#[test]
fn test_unfiltered_and_prefiltered_orders_agree() {
    let processor = RfmProcessor::new(2024, reference_date());
    let full = processor
        .process(
            &sample_customers(),
            &sample_orders(),
            &sample_catalog(),
            &sample_items(),
        )
        .unwrap();

    // hand-filter the order set the way an upstream caller would
    let mask: Vec<bool> = {
        let orders = sample_orders();
        let statuses = orders.column("Status").unwrap().str().unwrap();
        let dates = orders.column("Purchase Date").unwrap().str().unwrap();
        (0..orders.height())
            .map(|i| {
                statuses.get(i) == Some("processing")
                    && dates.get(i).is_some_and(|d| d.starts_with("2024-"))
            })
            .collect()
    };
    let prefiltered = sample_orders()
        .filter(&BooleanChunked::from_slice("mask", &mask))
        .unwrap();

    let same = processor
        .process(
            &sample_customers(),
            &prefiltered,
            &sample_catalog(),
            &sample_items(),
        )
        .unwrap();

    assert!(full.equals(&same));
}
