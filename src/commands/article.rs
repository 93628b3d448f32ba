use crate::commands::settings::load_effective_settings;
use crate::engine::catalog::is_valid_article_id;

/// Fills the `{id}` slot of the configured URL template.
pub fn article_url(url_template: &str, article_id: &str) -> Result<String, String> {
    let article_id = article_id.trim();
    if !is_valid_article_id(article_id) {
        return Err(format!("Invalid article id: {article_id}"));
    }
    Ok(url_template.replace("{id}", article_id))
}

#[tauri::command]
pub async fn open_article(data_dir: String, article_id: String) -> Result<String, String> {
    let settings = load_effective_settings(&data_dir)?;
    let url = article_url(&settings.article_url_template, &article_id)?;

    tauri_plugin_opener::open_url(url.as_str(), None::<&str>)
        .map_err(|e| format!("Could not open {url}: {e}"))?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_url_for_valid_id() {
        let url = article_url("https://kb.example.com/a/{id}?lang=en", " KBA00001234 ")
            .expect("url");
        assert_eq!(url, "https://kb.example.com/a/KBA00001234?lang=en");
    }

    #[test]
    fn rejects_invalid_id() {
        assert!(article_url("https://kb.example.com/{id}", "KBA12").is_err());
    }
}
