//! Benchmarks for module analysis.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::fs;
use std::hint::black_box;
use std::path::Path;

use idxlint::prelude::*;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Build a module with `entities` entities, each with a repository of
/// derived, JPQL and native queries and a changelog indexing half the
/// queried columns.
fn fixture(root: &Path, entities: usize) -> ModuleSource {
    let mut changelog = String::from("databaseChangeLog:\n");

    for n in 0..entities {
        write(
            root,
            &format!("src/main/kotlin/Entity{n}.kt"),
            &format!(
                r#"@Entity
@Table(name = "table_{n}")
class Entity{n}(
    @Id val id: Long,
    @Column(name = "email_address") val email: String,
    val status: String,
    val createdAt: Instant,
    val ownerId: Long,
)
"#
            ),
        );
        write(
            root,
            &format!("src/main/kotlin/Entity{n}Repository.kt"),
            &format!(
                r#"interface Entity{n}Repository : JpaRepository<Entity{n}, Long> {{
    fun findByEmail(email: String): Entity{n}?
    fun findAllByStatusAndCreatedAtAfter(status: String, after: Instant): List<Entity{n}>
    fun countByOwnerId(ownerId: Long): Long

    @Query("SELECT e FROM Entity{n} e WHERE e.status = :status ORDER BY e.createdAt")
    fun byStatus(status: String): List<Entity{n}>

    @Query(value = "SELECT * FROM table_{n} WHERE owner_id = ?1 AND status IN (?2)", nativeQuery = true)
    fun byOwner(ownerId: Long, status: List<String>): List<Entity{n}>
}}
"#
            ),
        );
        changelog.push_str(&format!(
            r#"  - changeSet:
      id: {n}
      author: bench
      changes:
        - createIndex:
            indexName: idx_table_{n}_email
            tableName: table_{n}
            columns:
              - column:
                  name: email_address
        - sql:
            sql: CREATE INDEX idx_table_{n}_status ON table_{n} (status, created_at)
"#
        ));
    }

    write(
        root,
        "src/main/resources/db/changelog/db.changelog-master.yaml",
        &changelog,
    );
    ModuleSource::new("bench", root)
}

/// Benchmark a full module analysis at several sizes.
fn bench_analyze_module(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze_module");

    for entities in [1usize, 10, 50] {
        let temp = TempDir::new().unwrap();
        let module = fixture(temp.path(), entities);
        let layout = ModuleLayout::default();
        let exclusions = Exclusions::default();

        group.throughput(Throughput::Elements(entities as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(entities),
            &module,
            |b, module| b.iter(|| black_box(analyze_module(module, &layout, &exclusions))),
        );
    }

    group.finish();
}

/// Benchmark baseline partitioning.
fn bench_baseline_compare(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    let module = fixture(temp.path(), 50);
    let current = analyze_module(&module, &ModuleLayout::default(), &Exclusions::default());
    let accepted: Vec<BaselineIssue> = current
        .iter()
        .step_by(2)
        .map(BaselineIssue::from)
        .collect();

    c.bench_function("baseline_compare", |b| {
        b.iter(|| black_box(baseline::compare(&current, &accepted)))
    });
}

criterion_group!(benches, bench_analyze_module, bench_baseline_compare);
criterion_main!(benches);
