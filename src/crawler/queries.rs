//! Query strategy catalog
//!
//! Code search serves at most 1000 results per query, so coverage comes from many
//! overlapping strategies that partition the result space by path, star count, creation
//! date, push date, language and topic. Later, narrower strategies are expected to
//! rediscover repositories found by earlier ones; deduplication happens in the crawler.

const BUILTIN_QUERIES: &[&str] = &[
    // Path variations
    "filename:init.lua path:.config/nvim",
    "filename:init.lua path:nvim",
    "filename:init.lua path:dotfiles",
    "filename:init.lua path:config",
    // Star ranges, most popular first
    "filename:init.lua stars:>1000",
    "filename:init.lua stars:500..1000",
    "filename:init.lua stars:200..500",
    "filename:init.lua stars:100..200",
    "filename:init.lua stars:50..100",
    "filename:init.lua stars:20..50",
    "filename:init.lua stars:10..20",
    "filename:init.lua stars:5..10",
    "filename:init.lua stars:1..5",
    "filename:init.lua stars:0",
    // Creation year
    "filename:init.lua created:2024-01-01..2024-12-31",
    "filename:init.lua created:2023-01-01..2023-12-31",
    "filename:init.lua created:2022-01-01..2022-12-31",
    "filename:init.lua created:2021-01-01..2021-12-31",
    "filename:init.lua created:2020-01-01..2020-12-31",
    "filename:init.lua created:2019-01-01..2019-12-31",
    "filename:init.lua created:2018-01-01..2018-12-31",
    "filename:init.lua created:2017-01-01..2017-12-31",
    "filename:init.lua created:<2017-01-01",
    // Recent activity
    "filename:init.lua pushed:>2024-06-01",
    "filename:init.lua pushed:2024-01-01..2024-06-01",
    "filename:init.lua pushed:2023-06-01..2024-01-01",
    "filename:init.lua pushed:2023-01-01..2023-06-01",
    // Lua language filter
    "language:lua filename:init.lua",
    "language:lua filename:init.lua stars:>100",
    "language:lua filename:init.lua stars:10..100",
    "language:lua filename:init.lua stars:1..10",
    "language:lua filename:init.lua stars:0",
    "language:lua filename:init.lua created:2024-01-01..2024-12-31",
    "language:lua filename:init.lua created:2023-01-01..2023-12-31",
    "language:lua filename:init.lua created:2022-01-01..2022-12-31",
    "language:lua filename:init.lua created:2021-01-01..2021-12-31",
    "language:lua filename:init.lua created:<2021-01-01",
    "language:lua filename:init.lua pushed:>2024-01-01",
    "language:lua filename:init.lua pushed:2023-01-01..2024-01-01",
    "language:lua filename:init.lua pushed:<2023-01-01",
    // Topic: neovim
    "filename:init.lua topic:neovim",
    "filename:init.lua topic:neovim stars:>100",
    "filename:init.lua topic:neovim stars:10..100",
    "filename:init.lua topic:neovim stars:1..10",
    "filename:init.lua topic:neovim stars:0",
    "filename:init.lua topic:neovim created:>2023-01-01",
    "filename:init.lua topic:neovim created:<2023-01-01",
    // Topic: dotfiles
    "filename:init.lua topic:dotfiles",
    "filename:init.lua topic:dotfiles stars:>50",
    "filename:init.lua topic:dotfiles stars:10..50",
    "filename:init.lua topic:dotfiles stars:1..10",
    "filename:init.lua topic:dotfiles stars:0",
    "filename:init.lua topic:dotfiles created:>2023-01-01",
    "filename:init.lua topic:dotfiles created:<2023-01-01",
    // Related topics
    "filename:init.lua topic:vim",
    "filename:init.lua topic:nvim",
    "filename:init.lua topic:lua",
    "filename:init.lua topic:config",
    "filename:init.lua topic:configuration",
    // Language and topic combined
    "language:lua topic:neovim",
    "language:lua topic:nvim",
    "language:lua topic:dotfiles",
    "language:lua topic:vim",
    // More path variations
    "filename:init.lua path:lua",
    "filename:init.lua path:neovim",
    "filename:init.lua path:.nvim",
    "filename:init.lua path:vim",
];

/// Immutable ordered list of search strategies
///
/// Order only determines iteration and resumption granularity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCatalog {
    queries: Vec<String>,
}

impl QueryCatalog {
    pub fn new(queries: Vec<String>) -> Self {
        Self { queries }
    }

    /// The default catalog of Neovim `init.lua` strategies
    pub fn builtin() -> Self {
        Self::new(BUILTIN_QUERIES.iter().map(|q| q.to_string()).collect())
    }

    /// Uses `queries` when configured, the built-in catalog otherwise
    pub fn from_config(queries: Option<&[String]>) -> Self {
        match queries {
            Some(queries) => Self::new(queries.to_vec()),
            None => Self::builtin(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.queries.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.queries.iter().map(String::as_str)
    }
}
