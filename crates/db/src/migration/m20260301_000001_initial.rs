//! Initial schema: budgets, partidas, conceptos, snapshots, price
//! observations and templates.
//!
//! Money and quantities are NUMERIC(24,6); percentages are fractions.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(BUDGETS_SQL).await?;
        db.execute_unprepared(SNAPSHOTS_SQL).await?;
        db.execute_unprepared(PRICE_OBSERVATIONS_SQL).await?;
        db.execute_unprepared(TEMPLATES_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const BUDGETS_SQL: &str = r"
CREATE TABLE budgets (
    id UUID PRIMARY KEY,
    project_id UUID,
    client_id UUID,
    name TEXT NOT NULL,
    currency VARCHAR(3) NOT NULL DEFAULT 'MXN',
    status VARCHAR(16) NOT NULL DEFAULT 'draft',
    settings JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_budget_status CHECK (status IN ('draft', 'published', 'closed')),
    CONSTRAINT chk_budget_name CHECK (length(trim(name)) > 0)
);

CREATE INDEX idx_budgets_project ON budgets(project_id) WHERE project_id IS NOT NULL;

CREATE TABLE partidas (
    id UUID PRIMARY KEY,
    budget_id UUID NOT NULL REFERENCES budgets(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    order_index INTEGER NOT NULL DEFAULT 0,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    notes TEXT,
    honorarios_pct_override NUMERIC(24, 6),
    desperdicio_pct_override NUMERIC(24, 6),
    cost_code VARCHAR(64),
    template_partida_id UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_partida_honorarios CHECK (honorarios_pct_override BETWEEN 0 AND 1),
    CONSTRAINT chk_partida_desperdicio CHECK (desperdicio_pct_override BETWEEN 0 AND 1)
);

CREATE INDEX idx_partidas_budget ON partidas(budget_id, order_index);

CREATE TABLE conceptos (
    id UUID PRIMARY KEY,
    partida_id UUID NOT NULL REFERENCES partidas(id) ON DELETE CASCADE,
    code VARCHAR(64),
    description TEXT NOT NULL,
    long_description TEXT,
    unit VARCHAR(32) NOT NULL DEFAULT '',
    provider TEXT,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    is_sumable BOOLEAN NOT NULL DEFAULT TRUE,
    order_index INTEGER NOT NULL DEFAULT 0,
    properties JSONB NOT NULL DEFAULT '{}'::jsonb,
    wbs_code VARCHAR(64),
    template_concepto_id UUID,
    cantidad_real NUMERIC(24, 6) NOT NULL DEFAULT 0,
    desperdicio_pct NUMERIC(24, 6),
    precio_real NUMERIC(24, 6) NOT NULL DEFAULT 0,
    honorarios_pct NUMERIC(24, 6),
    cantidad NUMERIC(24, 6) NOT NULL DEFAULT 0,
    pu NUMERIC(24, 6) NOT NULL DEFAULT 0,
    total_real NUMERIC(24, 6) NOT NULL DEFAULT 0,
    total NUMERIC(24, 6) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_concepto_cantidad CHECK (cantidad_real >= 0),
    CONSTRAINT chk_concepto_precio CHECK (precio_real >= 0),
    CONSTRAINT chk_concepto_honorarios CHECK (honorarios_pct BETWEEN 0 AND 1),
    CONSTRAINT chk_concepto_desperdicio CHECK (desperdicio_pct BETWEEN 0 AND 1)
);

CREATE INDEX idx_conceptos_partida ON conceptos(partida_id, order_index);
CREATE INDEX idx_conceptos_wbs ON conceptos(wbs_code) WHERE wbs_code IS NOT NULL;
";

const SNAPSHOTS_SQL: &str = r"
-- Immutable once written: no UPDATE path exists in the application.
CREATE TABLE budget_snapshots (
    id UUID PRIMARY KEY,
    budget_id UUID NOT NULL REFERENCES budgets(id) ON DELETE CASCADE,
    version_number INTEGER NOT NULL,
    snapshot_data JSONB NOT NULL,
    totals JSONB NOT NULL,
    tax_settings JSONB NOT NULL,
    grand_total NUMERIC(24, 6) NOT NULL,
    notes TEXT,
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_snapshot_version UNIQUE (budget_id, version_number),
    CONSTRAINT chk_snapshot_version CHECK (version_number >= 1)
);
";

const PRICE_OBSERVATIONS_SQL: &str = r"
-- Append-only log.
CREATE TABLE price_observations (
    id UUID PRIMARY KEY,
    cost_code VARCHAR(64) NOT NULL,
    unit VARCHAR(32) NOT NULL,
    unit_price NUMERIC(24, 6) NOT NULL,
    currency VARCHAR(3) NOT NULL DEFAULT 'MXN',
    exchange_rate NUMERIC(24, 6) NOT NULL DEFAULT 1,
    observed_on DATE NOT NULL,
    provider TEXT,
    project_id UUID,
    budget_id UUID REFERENCES budgets(id) ON DELETE SET NULL,
    version_number INTEGER,
    source VARCHAR(32) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_price_observation UNIQUE (budget_id, cost_code, unit, version_number),
    CONSTRAINT chk_price_positive_rate CHECK (exchange_rate > 0),
    CONSTRAINT chk_price_non_negative CHECK (unit_price >= 0)
);

CREATE INDEX idx_price_observations_lookup
    ON price_observations(cost_code, unit, observed_on DESC);
";

const TEMPLATES_SQL: &str = r"
CREATE TABLE templates (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE template_partidas (
    id UUID PRIMARY KEY,
    template_id UUID NOT NULL REFERENCES templates(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    order_index INTEGER NOT NULL DEFAULT 0,
    cost_code VARCHAR(64)
);

CREATE INDEX idx_template_partidas_template ON template_partidas(template_id, order_index);

CREATE TABLE template_conceptos (
    id UUID PRIMARY KEY,
    template_partida_id UUID NOT NULL REFERENCES template_partidas(id) ON DELETE CASCADE,
    code VARCHAR(64),
    description TEXT NOT NULL,
    long_description TEXT,
    unit VARCHAR(32) NOT NULL DEFAULT '',
    wbs_code VARCHAR(64),
    cantidad NUMERIC(24, 6) NOT NULL DEFAULT 0,
    precio_real NUMERIC(24, 6) NOT NULL DEFAULT 0,
    honorarios_pct NUMERIC(24, 6),
    desperdicio_pct NUMERIC(24, 6),
    order_index INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX idx_template_conceptos_partida ON template_conceptos(template_partida_id, order_index);
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS template_conceptos CASCADE;
DROP TABLE IF EXISTS template_partidas CASCADE;
DROP TABLE IF EXISTS templates CASCADE;
DROP TABLE IF EXISTS price_observations CASCADE;
DROP TABLE IF EXISTS budget_snapshots CASCADE;
DROP TABLE IF EXISTS conceptos CASCADE;
DROP TABLE IF EXISTS partidas CASCADE;
DROP TABLE IF EXISTS budgets CASCADE;
";
