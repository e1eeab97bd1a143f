//! Route table mapping Control Room URLs to page types and their tools.
//!
//! Only the path/fragment matters, so the table works on any Control Room
//! host. Entries are checked in order and the first match wins.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PageType {
    PrivateBot,
    PublicBot,
    PrivateFolder,
    PublicFolder,
    Credentials,
    Packages,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::PrivateBot => "privateBot",
            PageType::PublicBot => "publicBot",
            PageType::PrivateFolder => "privateFolder",
            PageType::PublicFolder => "publicFolder",
            PageType::Credentials => "credentials",
            PageType::Packages => "packages",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "privateBot" => Ok(PageType::PrivateBot),
            "publicBot" => Ok(PageType::PublicBot),
            "privateFolder" => Ok(PageType::PrivateFolder),
            "publicFolder" => Ok(PageType::PublicFolder),
            "credentials" => Ok(PageType::Credentials),
            "packages" => Ok(PageType::Packages),
            other => Err(format!("unknown page type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tool {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
    pub action: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    #[serde(skip_serializing)]
    pub patterns: Vec<Regex>,
    pub page_type: PageType,
    pub display_name: &'static str,
    pub icon: &'static str,
    pub tools: Vec<Tool>,
}

impl RouteConfig {
    pub fn matches(&self, url: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(url))
    }
}

const BEST_PRACTICES: Tool = Tool {
    id: "best-practices",
    name: "Best Practices",
    icon: "CheckCircle",
    description: "Analyze bot for best practices and coding standards",
    action: "BEST_PRACTICES",
};

const CONTENT_MODIFICATION: Tool = Tool {
    id: "content-modification",
    name: "Content Modification",
    icon: "Code",
    description: "Copy and modify bot content JSON",
    action: "CONTENT_MODIFICATION",
};

const DOWNLOAD_FILES: Tool = Tool {
    id: "download-files",
    name: "Download Files",
    icon: "Download",
    description: "Browse and download files from this folder",
    action: "DOWNLOAD_FILES",
};

const UPDATE_PACKAGES: Tool = Tool {
    id: "update-packages",
    name: "Update Packages",
    icon: "Package",
    description: "Update bot packages to their default versions",
    action: "UPDATE_PACKAGES",
};

const COPY_FILES: Tool = Tool {
    id: "copy-files",
    name: "Copy Files",
    icon: "Copy",
    description: "Copy files to another folder",
    action: "COPY_FILES",
};

const VIEW_ATTRIBUTES: Tool = Tool {
    id: "view-attributes",
    name: "View Attributes",
    icon: "Eye",
    description: "View and copy credential attributes",
    action: "VIEW_ATTRIBUTES",
};

const PACKAGE_DOWNLOAD: Tool = Tool {
    id: "package-download",
    name: "Package Download",
    icon: "Download",
    description: "Download package JAR files",
    action: "PACKAGE_DOWNLOAD",
};

fn patterns(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|s| Regex::new(s).expect("builtin route pattern is valid"))
        .collect()
}

static BUILTIN: LazyLock<RouteTable> = LazyLock::new(|| {
    RouteTable::new(vec![
        RouteConfig {
            patterns: patterns(&[
                r"#/bots/repository/private/files/task/\d+/edit",
                r"#/bots/repository/private/taskbots/",
            ]),
            page_type: PageType::PrivateBot,
            display_name: "Private Taskbot",
            icon: "Bot",
            tools: vec![BEST_PRACTICES, CONTENT_MODIFICATION],
        },
        RouteConfig {
            patterns: patterns(&[
                r"#/bots/repository/public/taskbots/\d+/view",
                r"#/bots/repository/public/taskbots/",
            ]),
            page_type: PageType::PublicBot,
            display_name: "Public Taskbot",
            icon: "Bot",
            tools: vec![BEST_PRACTICES],
        },
        RouteConfig {
            patterns: patterns(&[r"#/bots/repository/private/folders/"]),
            page_type: PageType::PrivateFolder,
            display_name: "Private Folders",
            icon: "Folder",
            tools: vec![DOWNLOAD_FILES, UPDATE_PACKAGES, COPY_FILES],
        },
        RouteConfig {
            patterns: patterns(&[r"#/bots/repository/public/folders/"]),
            page_type: PageType::PublicFolder,
            display_name: "Public Folders",
            icon: "FolderOpen",
            tools: vec![DOWNLOAD_FILES],
        },
        RouteConfig {
            patterns: patterns(&[r"#/bots/credentials/mycredentials/\d+/"]),
            page_type: PageType::Credentials,
            display_name: "Credentials",
            icon: "Key",
            tools: vec![VIEW_ATTRIBUTES],
        },
        RouteConfig {
            patterns: patterns(&[r"#/bots/packages/versions"]),
            page_type: PageType::Packages,
            display_name: "Packages",
            icon: "Package",
            tools: vec![PACKAGE_DOWNLOAD],
        },
    ])
});

static PRIVATE_BOT_IDS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"/files/task/(\d+)/edit").expect("valid"),
        Regex::new(r"/private/taskbots/(\d+)").expect("valid"),
    ]
});

static PUBLIC_BOT_IDS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"/taskbots/(\d+)/view").expect("valid"),
        Regex::new(r"/public/taskbots/(\d+)").expect("valid"),
    ]
});

static FOLDER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/folders/([^/]+)").expect("valid"));

/// An ordered, immutable list of routes.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteConfig>,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteConfig>) -> Self {
        Self { routes }
    }

    pub fn builtin() -> &'static RouteTable {
        &BUILTIN
    }

    pub fn routes(&self) -> &[RouteConfig] {
        &self.routes
    }

    /// First route with any matching pattern. `None` means an unsupported page.
    pub fn resolve(&self, url: &str) -> Option<&RouteConfig> {
        self.routes.iter().find(|r| r.matches(url))
    }

    pub fn tools_for(&self, page_type: PageType) -> &[Tool] {
        self.routes
            .iter()
            .find(|r| r.page_type == page_type)
            .map(|r| r.tools.as_slice())
            .unwrap_or(&[])
    }

    /// Every distinct tool across the table, in first-seen order.
    pub fn all_tools(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = Vec::new();
        for tool in self.routes.iter().flat_map(|r| r.tools.iter()) {
            if !tools.iter().any(|t| t.id == tool.id) {
                tools.push(tool.clone());
            }
        }
        tools
    }

    pub fn page_context(&self, url: &str) -> PageContext {
        let route = self.resolve(url);
        let page_type = route.map(|r| r.page_type);
        let capture = |re: &Regex| {
            re.captures(url)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        };

        let file_id = match page_type {
            Some(PageType::PrivateBot) => PRIVATE_BOT_IDS.iter().find_map(capture),
            Some(PageType::PublicBot) => PUBLIC_BOT_IDS.iter().find_map(capture),
            _ => None,
        };
        let folder_id = match page_type {
            Some(PageType::PrivateFolder | PageType::PublicFolder) => capture(&FOLDER_ID),
            _ => None,
        };

        PageContext {
            url: url.to_string(),
            page_type: page_type.map(|p| p.as_str()).unwrap_or("unknown"),
            name: route.map(|r| r.display_name).unwrap_or("Unknown Page"),
            file_id,
            folder_id,
        }
    }
}

/// What the panel knows about the page from its URL alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    pub url: String,
    #[serde(rename = "type")]
    pub page_type: &'static str,
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
}

pub fn resolve(url: &str) -> Option<&'static RouteConfig> {
    RouteTable::builtin().resolve(url)
}

pub fn tools_for(page_type: PageType) -> &'static [Tool] {
    RouteTable::builtin().tools_for(page_type)
}

pub fn all_tools() -> Vec<Tool> {
    RouteTable::builtin().all_tools()
}
