pub mod commands;
pub mod config;
pub mod cover;
pub mod db;
pub mod error;
pub mod formats;
pub mod logging;
pub mod models;
pub mod reader;

#[cfg(feature = "desktop")]
mod desktop;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{Error, Result};

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use commands::session::SessionRegistry;
    use desktop::*;
    use reader::ComicPageCache;
    use std::sync::Arc;
    use tauri::Manager;
    use tokio::sync::Mutex;

    let config = Config::from_env();
    logging::init(&config.log_filter);

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_fs::init())
        .plugin(tauri_plugin_opener::init())
        .setup(move |app| {
            let data_dir = config.data_dir_or(app.path().app_data_dir().ok());
            let pool = tauri::async_runtime::block_on(db::connect(&config, &data_dir))?;

            app.manage(Arc::new(Mutex::new(pool)));
            app.manage(Arc::new(Mutex::new(SessionRegistry::new())));
            app.manage(ComicPageCache::new(config.comic_cache_bytes()));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            frontend_log,
            import_books,
            import_book_files,
            list_books,
            get_book,
            update_progress,
            update_book_details,
            set_favorite,
            delete_book,
            get_book_file,
            get_book_cover,
            list_annotations,
            toggle_bookmark,
            add_highlight,
            add_note,
            delete_annotation,
            list_collections,
            get_collection,
            create_collection,
            rename_collection,
            delete_collection,
            add_book_to_collection,
            remove_book_from_collection,
            begin_session,
            session_visibility,
            end_session,
            list_sessions,
            reading_insights,
            get_settings,
            save_settings,
            reset_settings,
            export_library,
            comic_page_names,
            comic_page,
            shortcut_help
        ])
        .build(tauri::generate_context!());

    let app = match app {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "failed to start");
            std::process::exit(1);
        }
    };

    app.run(|handle, event| {
        if let tauri::RunEvent::Exit = event {
            tauri::async_runtime::block_on(close_all_sessions(handle));
        }
    });
}
