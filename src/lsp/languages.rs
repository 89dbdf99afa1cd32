//! Language-server recipes, keyed by file extension.

use std::path::Path;

/// How to run one language's server, plus what to tell the user when the
/// binary is missing.
#[derive(Debug, Clone, Copy)]
pub struct ServerRecipe {
    /// LSP `languageId` and pool key.
    pub language_id: &'static str,
    pub command: &'static str,
    pub args: &'static [&'static str],
    pub install_hint: &'static str,
}

const RECIPES: &[(&[&str], ServerRecipe)] = &[
    (
        &["rs"],
        ServerRecipe {
            language_id: "rust",
            command: "rust-analyzer",
            args: &[],
            install_hint: "install rust-analyzer: rustup component add rust-analyzer",
        },
    ),
    (
        &["go"],
        ServerRecipe {
            language_id: "go",
            command: "gopls",
            args: &[],
            install_hint: "install gopls: go install golang.org/x/tools/gopls@latest",
        },
    ),
    (
        &["py"],
        ServerRecipe {
            language_id: "python",
            command: "pyright-langserver",
            args: &["--stdio"],
            install_hint: "install pyright: npm install -g pyright",
        },
    ),
    (
        &["ts", "tsx", "js", "jsx"],
        ServerRecipe {
            language_id: "typescript",
            command: "typescript-language-server",
            args: &["--stdio"],
            install_hint: "install: npm install -g typescript-language-server typescript",
        },
    ),
    (
        &["c", "h", "cc", "cpp", "hpp"],
        ServerRecipe {
            language_id: "c",
            command: "clangd",
            args: &[],
            install_hint: "install clangd from your distribution's LLVM packages",
        },
    ),
];

/// Recipe for a file, inferred from its extension.
pub fn recipe_for(path: &Path) -> Option<&'static ServerRecipe> {
    let ext = path.extension()?.to_str()?;
    RECIPES
        .iter()
        .find(|(exts, _)| exts.contains(&ext))
        .map(|(_, recipe)| recipe)
}
