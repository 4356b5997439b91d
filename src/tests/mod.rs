mod integration_backfill_job;
mod integration_postgres_store;
