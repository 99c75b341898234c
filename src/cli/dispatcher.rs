use std::path::Path;

use log::debug;

use crate::cli::main_types::Commands;
use crate::core::action::UserAction;
use crate::core::session::{Session, describe_window};
use crate::display::table::{ConsoleSink, TableDisplay};
use crate::error::{AppError, QueryError};
use crate::storage::config::Settings;
use crate::utils::validation::validate_database_path;

pub struct Dispatcher {
    settings: Settings,
}

impl Dispatcher {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run one command against `database`. Returns the number of errors
    /// printed along the way; fatal errors are returned instead.
    pub async fn dispatch(&self, database: &Path, command: Commands) -> Result<usize, AppError> {
        validate_database_path(database)?;
        debug!("Settings: {:?}", self.settings);

        let mut sink = ConsoleSink::new(TableDisplay::new(self.settings.max_cell_width));
        if matches!(command, Commands::Cell { .. }) {
            sink = sink.without_rows();
        }
        let mut session = Session::open(database, self.settings.clone(), sink)?;

        let outcome = self.run(&mut session, command).await;
        session.close().await?;
        outcome?;
        Ok(session.sink().error_count())
    }

    async fn run(&self, session: &mut Session<ConsoleSink>, command: Commands) -> Result<(), AppError> {
        match command {
            Commands::Schema { object: None } => session.dispatch(UserAction::ShowSchema),
            Commands::Schema { object: Some(name) } => {
                let sql = session.catalog().definition(&name).ok_or_else(|| {
                    AppError::Query(QueryError::InvalidTable {
                        table: name.clone(),
                    })
                })?;
                println!("{};", sql);
                Ok(())
            }
            Commands::Browse {
                table,
                sort,
                desc,
                filter,
                offset,
                pages,
            } => {
                // reject unknown names up front so the exit status reflects them
                let table = session.catalog().table(&table)?.name.clone();
                session.dispatch(UserAction::SelectTable(table.clone()))?;
                if let Some(filter) = filter {
                    session.dispatch(UserAction::SubmitFilter(filter))?;
                }
                if let Some(column) = sort {
                    session.dispatch(UserAction::ToggleSort(column.clone()))?;
                    if desc {
                        session.dispatch(UserAction::ToggleSort(column))?;
                    }
                }
                if offset > 0 {
                    session.dispatch(UserAction::ScrollTo(offset))?;
                }
                session.run_until_idle().await?;

                for _ in 1..pages.max(1) {
                    let has_more = session
                        .displayed(&table)
                        .is_some_and(|window| window.has_more);
                    if !has_more {
                        break;
                    }
                    session.dispatch(UserAction::NextPage)?;
                    session.run_until_idle().await?;
                }
                if let Some(window) = session.displayed(&table) {
                    debug!("Last page: {}", describe_window(window));
                }
                Ok(())
            }
            Commands::Sql { query } => {
                session.dispatch(UserAction::SubmitSql(query))?;
                session.run_until_idle().await
            }
            Commands::Cell { table, row, column } => {
                let table = session.catalog().table(&table)?.name.clone();
                session.catalog().column(&table, &column)?;
                session.dispatch(UserAction::SelectTable(table))?;
                session.dispatch(UserAction::ScrollTo(row))?;
                session.run_until_idle().await?;
                session.dispatch(UserAction::ViewCell { row, column })?;
                session.run_until_idle().await
            }
        }
    }
}
