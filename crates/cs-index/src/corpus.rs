//! The finalized, immutable corpus: chunks, content arena, and the file /
//! tree / repo tables sitting above them. Frozen after [`crate::builder::CorpusBuilder::finalize`];
//! shared read-only across query workers (spec.md §5: "Immutable shared
//! state... workers hold shared read-only references. No locks needed.").

use crate::chunk::Chunk;
use cs_core::model::{IndexedFile, Repo, Tree};
use cs_core::{ChunkId, FileId, RepoId, TreeId};

pub struct Corpus {
    pub chunks: Vec<Chunk>,
    pub(crate) _content_arena: Vec<Box<[u8]>>,
    pub repos: Vec<Repo>,
    pub trees: Vec<Tree>,
    pub files: Vec<IndexedFile>,
}

impl Corpus {
    pub fn chunk(&self, id: ChunkId) -> &Chunk {
        &self.chunks[id.index()]
    }

    pub fn file(&self, id: FileId) -> &IndexedFile {
        &self.files[id.index()]
    }

    pub fn tree(&self, id: TreeId) -> &Tree {
        &self.trees[id.index()]
    }

    pub fn repo(&self, id: RepoId) -> &Repo {
        &self.repos[id.index()]
    }

    /// The full `tree/path` identity used for file-pattern matching.
    pub fn file_path(&self, id: FileId) -> String {
        let file = self.file(id);
        format!("{}/{}", self.repo(self.tree(file.tree).repo).name, file.path)
    }

    pub fn repo_name(&self, id: FileId) -> &str {
        let file = self.file(id);
        &self.repo(self.tree(file.tree).repo).name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CorpusBuilder;
    use cs_core::Config;

    #[test]
    fn file_path_joins_repo_and_path() {
        let mut b = CorpusBuilder::new(Config::default());
        let repo = b.add_repo(Repo { name: "myrepo".into(), metadata: Default::default() });
        let tree = b.add_tree(Tree { repo, revision: "HEAD".into() });
        b.index_file(tree, "src/main.rs", b"fn main() {}\n", 0).unwrap();
        let corpus = b.finalize();
        assert_eq!(corpus.file_path(FileId(0)), "myrepo/src/main.rs");
    }
}
