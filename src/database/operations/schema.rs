use sqlx::{Executor, PgPool};

/// Columns and indexes `agent_runs` needs.
const ADD_AGENT_RUN_COLUMNS: &str = r#"
    ALTER TABLE public.agent_runs ADD COLUMN IF NOT EXISTS thread_id UUID REFERENCES public.threads(thread_id) ON DELETE CASCADE;
    ALTER TABLE public.agent_runs ADD COLUMN IF NOT EXISTS completed_at TIMESTAMP WITH TIME ZONE;
    ALTER TABLE public.agent_runs ADD COLUMN IF NOT EXISTS error TEXT;
    ALTER TABLE public.agent_runs ADD COLUMN IF NOT EXISTS responses JSONB NOT NULL DEFAULT '[]'::jsonb;
    ALTER TABLE public.agent_runs ADD COLUMN IF NOT EXISTS started_at TIMESTAMP WITH TIME ZONE DEFAULT TIMEZONE('utc'::text, NOW());
    ALTER TABLE public.agent_runs ADD COLUMN IF NOT EXISTS updated_at TIMESTAMP WITH TIME ZONE DEFAULT TIMEZONE('utc'::text, NOW());

    CREATE INDEX IF NOT EXISTS idx_agent_runs_thread_id ON public.agent_runs USING btree (thread_id);
    CREATE INDEX IF NOT EXISTS idx_agent_runs_created_at ON public.agent_runs USING btree (created_at);
"#;

const UPDATED_AT_FUNCTION: &str = r#"
    CREATE OR REPLACE FUNCTION update_updated_at_column()
    RETURNS TRIGGER AS $$
    BEGIN
        NEW.updated_at = TIMEZONE('utc'::text, NOW());
        RETURN NEW;
    END;
    $$ language 'plpgsql';
"#;

const UPDATED_AT_TRIGGER: &str = r#"
    DROP TRIGGER IF EXISTS update_agent_runs_updated_at ON public.agent_runs;

    CREATE TRIGGER update_agent_runs_updated_at
    BEFORE UPDATE ON public.agent_runs
    FOR EACH ROW
    EXECUTE FUNCTION update_updated_at_column();
"#;

const ROW_LEVEL_SECURITY: &str = r#"
    ALTER TABLE public.agent_runs ENABLE ROW LEVEL SECURITY;

    DROP POLICY IF EXISTS agent_run_select_policy ON public.agent_runs;
    DROP POLICY IF EXISTS agent_run_insert_policy ON public.agent_runs;
    DROP POLICY IF EXISTS agent_run_update_policy ON public.agent_runs;
    DROP POLICY IF EXISTS agent_run_delete_policy ON public.agent_runs;

    CREATE POLICY agent_run_select_policy ON public.agent_runs
        FOR SELECT
        USING (
            EXISTS (
                SELECT 1 FROM public.threads
                WHERE threads.thread_id = agent_runs.thread_id
                AND (
                    threads.is_public = TRUE OR
                    basejump.has_role_on_account(threads.account_id) = true
                )
            )
        );

    CREATE POLICY agent_run_insert_policy ON public.agent_runs
        FOR INSERT
        WITH CHECK (
            EXISTS (
                SELECT 1 FROM public.threads
                WHERE threads.thread_id = agent_runs.thread_id
                AND basejump.has_role_on_account(threads.account_id) = true
            )
        );

    CREATE POLICY agent_run_update_policy ON public.agent_runs
        FOR UPDATE
        USING (
            EXISTS (
                SELECT 1 FROM public.threads
                WHERE threads.thread_id = agent_runs.thread_id
                AND basejump.has_role_on_account(threads.account_id) = true
            )
        );

    CREATE POLICY agent_run_delete_policy ON public.agent_runs
        FOR DELETE
        USING (
            EXISTS (
                SELECT 1 FROM public.threads
                WHERE threads.thread_id = agent_runs.thread_id
                AND basejump.has_role_on_account(threads.account_id) = true
            )
        );

    GRANT ALL PRIVILEGES ON TABLE public.agent_runs TO authenticated, service_role;
"#;

/// Ordered repair steps, each named for the log line emitted after it runs.
pub const SCHEMA_FIXES: [(&str, &str); 4] = [
    ("added missing columns to agent_runs", ADD_AGENT_RUN_COLUMNS),
    ("created update_updated_at_column function", UPDATED_AT_FUNCTION),
    ("created update_agent_runs_updated_at trigger", UPDATED_AT_TRIGGER),
    ("enabled RLS and policies for agent_runs", ROW_LEVEL_SECURITY),
];

/// Idempotent repair of the `agent_runs` table. Every statement is guarded
/// with `IF NOT EXISTS` / `DROP ... IF EXISTS`, so re-running is harmless.
pub async fn apply_database_fixes(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Applying database fixes");
    let mut conn = pool.acquire().await?;

    for (step, sql) in SCHEMA_FIXES {
        // &str goes over the simple query protocol, which allows several statements.
        (&mut *conn).execute(sql).await?;
        tracing::info!("{}", step);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixes_are_guarded() {
        assert_eq!(
            ADD_AGENT_RUN_COLUMNS
                .matches("ADD COLUMN IF NOT EXISTS")
                .count(),
            6
        );
        assert!(UPDATED_AT_TRIGGER.contains("DROP TRIGGER IF EXISTS"));
        assert!(SCHEMA_FIXES[1].1.contains("CREATE OR REPLACE FUNCTION"));
    }
}
