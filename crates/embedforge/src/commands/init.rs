//! Initialize a widget project.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command.
pub async fn run(yes: bool) -> Result<()> {
    tracing::info!("Initializing embedforge project...");

    let src_dir = Path::new("src");

    if src_dir.exists() {
        if !yes {
            tracing::warn!("src/ directory already exists. Use --yes to overwrite.");
            return Ok(());
        }
    } else {
        fs::create_dir_all(src_dir).context("Failed to create src directory")?;
    }

    let files: &[(&Path, &str)] = &[
        (Path::new("embed.toml"), DEFAULT_CONFIG),
        (Path::new("src/main.js"), DEFAULT_MAIN_JS),
        (Path::new("src/demo.js"), DEFAULT_DEMO_JS),
        (Path::new("src/demo.css"), DEFAULT_DEMO_CSS),
        (Path::new("src/index.html"), DEFAULT_INDEX_HTML),
        (Path::new("src/demo.html"), DEFAULT_DEMO_HTML),
    ];

    for &(path, content) in files {
        if !path.exists() || yes {
            fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Created {}", path.display());
        }
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'embedforge dev' to start the development server.");

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# embedforge configuration

[project]
# Entry sources and document templates
src = "src"

# Output directory for built artifacts
output = "dist"

[loader]
source = "main.js"
params = ["TrackingID", "MediaEndPoint"]

# Remove this table to ship the loader without any demo artifacts.
[demo]
source = "demo.js"
styles = ["demo.css"]
params = ["HashId", "WistiaS3JSUrl"]

[build]
minify = true
"#;

const DEFAULT_MAIN_JS: &str = r#"(function (env) {
  window.MEDIA_ENDPOINT = env.MEDIA_ENDPOINT || undefined;
  import("wistia-s3-player/dist/js/wistia-s3-player.min").then((module) => {
    const init = module.default || module;
    init("{{.TrackingID}}");
  });
})({
  ...window,
  MEDIA_ENDPOINT: "{{.MediaEndPoint}}",
});
"#;

const DEFAULT_DEMO_JS: &str = r##"import "highlight.js/styles/github-dark.min.css";
import hljs from "highlight.js/lib/core";
import xml from "highlight.js/lib/languages/xml";
import ClipboardJS from "clipboard";

const snippet = `
<div class="wistia_responsive_padding">
  <div class="wistia_responsive_wrapper">
    <div class="wistia_embed wistia_async_{{.HashId}} videoFoam=true playsinline=true" style="height:100%;width:100%">&nbsp;</div>
  </div>
</div>
<script type="text/javascript" src="{{.WistiaS3JSUrl}}"></script>`;

hljs.registerLanguage("xml", xml);

const block = document.querySelector("#code-block-1");
block.innerHTML = hljs.highlight(snippet, { language: "xml" }).value;

new ClipboardJS(".copy-btn");

hljs.highlightAll();
"##;

const DEFAULT_DEMO_CSS: &str = r#"body {
  font-family: system-ui, -apple-system, sans-serif;
  max-width: 860px;
  margin: 2rem auto;
  padding: 0 1rem;
}

.wistia_responsive_padding {
  padding: 56.25% 0 0 0;
  position: relative;
}

.wistia_responsive_wrapper {
  height: 100%;
  left: 0;
  position: absolute;
  top: 0;
  width: 100%;
}

pre {
  background: #0d1117;
  border-radius: 0.5rem;
  padding: 1rem;
  overflow-x: auto;
}

.copy-btn {
  padding: 0.25rem 0.75rem;
  cursor: pointer;
}
"#;

const DEFAULT_INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{.VideoName}}</title>
</head>
<body>
  <div class="wistia_responsive_padding" style="padding:56.25% 0 0 0;position:relative;">
    <div class="wistia_responsive_wrapper" style="height:100%;left:0;position:absolute;top:0;width:100%;">
      <div class="wistia_embed wistia_async_{{.HashId}} videoFoam=true playsinline=true" style="height:100%;width:100%">&nbsp;</div>
    </div>
  </div>
  <script type="text/javascript" src="{{.WistiaS3JSUrl}}"></script>
</body>
</html>
"#;

const DEFAULT_DEMO_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{.VideoName}} demo</title>
</head>
<body>
  <h1>{{.VideoName}}</h1>

  <div class="wistia_responsive_padding">
    <div class="wistia_responsive_wrapper">
      <div class="wistia_embed wistia_async_{{.HashId}} videoFoam=true playsinline=true" style="height:100%;width:100%">&nbsp;</div>
    </div>
  </div>
  <script type="text/javascript" src="{{.WistiaS3JSUrl}}"></script>

  <h2>Embed code</h2>
  <pre><code id="code-block-1"></code></pre>
  <button class="copy-btn" data-clipboard-target="#code-block-1" type="button">Copy</button>
</body>
</html>
"##;
