//! Database seeder for Obra development.
//!
//! Seeds a price history, a reusable template and a demo budget that is
//! built by applying the template, edited and then published once.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use anyhow::Context;
use chrono::{Days, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use obra_core::budget::{
    BudgetService, BudgetSettings, CreateBudgetInput, CreateConceptoInput, CreatePartidaInput,
};
use obra_core::pricing::{NewPriceObservation, ObservationSource, PriceService, RecordOutcome};
use obra_core::snapshot::{PublishInput, SnapshotService};
use obra_core::template::{
    CreateTemplateConceptoInput, CreateTemplateInput, CreateTemplatePartidaInput,
    StaticCostCatalog, TemplateService,
};
use obra_db::{BudgetRepository, PriceObservationRepository, SnapshotRepository, TemplateRepository};
use obra_shared::AppConfig;
use obra_shared::types::{Currency, UserId};

/// Cost codes the demo catalog recognises.
const CATALOG: [&str; 6] = ["CIM", "CIM-01", "CIM-02", "EST", "EST-01", "EST-02"];

/// Historical unit prices for a poured cubic metre of footing, oldest first.
const FOOTING_PRICES: [i64; 8] = [2350, 2410, 2480, 2500, 2520, 2550, 2600, 2690];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "obra=debug,seeder=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let db = obra_db::connect_with(&config.database)
        .await
        .context("Failed to connect to database")?;
    let engine = config.engine;
    let author = UserId::new();

    let budget_repo = Arc::new(BudgetRepository::new(db.clone()));
    let prices = Arc::new(PriceService::new(
        Arc::new(PriceObservationRepository::new(db.clone())),
        engine.pricing.clone(),
        engine.features,
    ));
    let budgets = BudgetService::new(Arc::clone(&budget_repo), engine.clone());
    let snapshots = SnapshotService::new(
        Arc::clone(&budget_repo),
        Arc::new(SnapshotRepository::new(db.clone())),
        Arc::clone(&prices),
        engine.clone(),
    );
    let templates = TemplateService::new(
        Arc::new(TemplateRepository::new(db.clone())),
        budget_repo,
        Arc::new(StaticCostCatalog::new(CATALOG)),
        engine,
    );

    info!("Seeding price history...");
    let today = Utc::now().date_naive();
    let mut recorded = 0_u32;
    for (weeks_ago, price) in (1_u64..).zip(FOOTING_PRICES.iter().rev()) {
        let outcome = prices
            .record_observation(NewPriceObservation {
                cost_code: "CIM-01".to_string(),
                unit: "m3".to_string(),
                unit_price: Decimal::new(*price, 0),
                currency: Currency::Mxn,
                exchange_rate: None,
                observed_on: today - Days::new(weeks_ago * 7),
                provider: Some("Concretos del Centro".to_string()),
                project_id: None,
                budget_id: None,
                version_number: None,
                source: ObservationSource::ExternalActual,
            })
            .await?;
        if matches!(outcome, RecordOutcome::Recorded(_)) {
            recorded += 1;
        }
    }
    info!(recorded, "Price history seeded");

    info!("Seeding template...");
    let template = templates
        .create_template(CreateTemplateInput {
            name: "Casa habitación una planta".to_string(),
            description: Some("Obra negra para vivienda de 90 m2".to_string()),
            created_by: author,
            partidas: vec![
                CreateTemplatePartidaInput {
                    name: "Cimentación".to_string(),
                    cost_code: Some("CIM".to_string()),
                    conceptos: vec![
                        CreateTemplateConceptoInput {
                            description: "Zapata corrida de concreto f'c=250".to_string(),
                            unit: "m3".to_string(),
                            wbs_code: Some("CIM-01".to_string()),
                            cantidad: Decimal::new(18, 0),
                            precio_real: Decimal::new(2500, 0),
                            ..CreateTemplateConceptoInput::default()
                        },
                        CreateTemplateConceptoInput {
                            description: "Plantilla de concreto pobre".to_string(),
                            unit: "m2".to_string(),
                            wbs_code: Some("CIM-02".to_string()),
                            cantidad: Decimal::new(60, 0),
                            precio_real: Decimal::new(185, 0),
                            ..CreateTemplateConceptoInput::default()
                        },
                    ],
                },
                CreateTemplatePartidaInput {
                    name: "Estructura".to_string(),
                    cost_code: Some("EST".to_string()),
                    conceptos: vec![CreateTemplateConceptoInput {
                        description: "Acero de refuerzo fy=4200".to_string(),
                        unit: "kg".to_string(),
                        wbs_code: Some("EST-01".to_string()),
                        cantidad: Decimal::new(2400, 0),
                        precio_real: Decimal::new(28, 0),
                        honorarios_pct: Some(Decimal::new(20, 2)),
                        ..CreateTemplateConceptoInput::default()
                    }],
                },
            ],
        })
        .await?;
    info!(template_id = %template.id, "Template seeded");

    info!("Seeding demo budget...");
    let budget = budgets
        .create_budget(CreateBudgetInput {
            project_id: None,
            client_id: None,
            name: "Demo - Casa Lomas".to_string(),
            currency: Currency::Mxn,
            settings: BudgetSettings::default(),
            created_by: author,
        })
        .await?;

    let report = templates.apply_template(template.id, budget.id).await?;
    info!(
        partidas = report.partidas_created.len(),
        conceptos = report.conceptos_created.len(),
        unmapped = report.unmapped.len(),
        "Template applied"
    );

    let extras = budgets
        .add_partida(
            budget.id,
            CreatePartidaInput {
                name: "Preliminares".to_string(),
                desperdicio_pct_override: Some(Decimal::ZERO),
                ..CreatePartidaInput::default()
            },
        )
        .await?;
    budgets
        .add_concepto(
            extras.id,
            CreateConceptoInput {
                description: "Limpieza y trazo del terreno".to_string(),
                unit: "m2".to_string(),
                cantidad_real: Decimal::new(120, 0),
                precio_real: Decimal::new(14, 0),
                ..CreateConceptoInput::default()
            },
        )
        .await?;

    let (_, alert) = prices
        .check_price("CIM-01", "m3", Decimal::new(3100, 0))
        .await;
    if let Some(alert) = alert {
        warn!(severity = ?alert.severity, "{}", alert.message);
    }

    let published = snapshots
        .publish(
            budget.id,
            PublishInput {
                tax_settings: None,
                notes: Some("Versión inicial para cliente".to_string()),
                published_by: author,
            },
        )
        .await?;
    info!(
        budget_id = %budget.id,
        version = published.snapshot.version_number,
        grand_total = %published.snapshot.totals.grand_total,
        observations = published.observations_recorded,
        "Demo budget published"
    );

    info!("Seeding complete");
    Ok(())
}
