//! Comparison benchmarks.
//!
//! Measures the cost of diffing OpenAPI specs with varying numbers of
//! operations, both for identical documents and for documents where every
//! operation carries a breaking change.
//!
//! Run with: cargo bench -p oasguard-diff --bench diff

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use oasguard_diff::{parse_spec, ApiSpec, DiffEngine};

/// Generate an OpenAPI 3.1 spec YAML with N operations.
///
/// Each operation has a path param, query param, request body and a response
/// referencing a shared recursive component schema.
fn generate_spec(operation_count: usize, max_limit: u32) -> String {
    let mut yaml = String::from(
        r##"openapi: "3.1.0"
info:
  title: Benchmark API
  version: "1.0.0"
components:
  schemas:
    Node:
      type: object
      required: [id]
      properties:
        id:
          type: string
          format: uuid
        children:
          type: array
          items:
            $ref: "#/components/schemas/Node"
paths:
"##,
    );

    for i in 0..operation_count {
        let resource = format!("resource{}", i);
        yaml.push_str(&format!(
            r##"  /{resource}/{{id}}:
    post:
      operationId: post_{resource}
      parameters:
        - name: id
          in: path
          required: true
          schema:
            type: string
            format: uuid
        - name: limit
          in: query
          schema:
            type: integer
            minimum: 1
            maximum: {max_limit}
      requestBody:
        required: false
        content:
          application/json:
            schema:
              type: object
              properties:
                name:
                  type: string
                  minLength: 1
                  maxLength: 255
                email:
                  type: string
                  format: email
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema:
                $ref: "#/components/schemas/Node"
"##,
            resource = resource,
            max_limit = max_limit,
        ));
    }

    yaml
}

fn parse(yaml: &str) -> ApiSpec {
    parse_spec(yaml).unwrap().spec
}

fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");
    let engine = DiffEngine::default();

    for op_count in [10, 50, 100] {
        let old = parse(&generate_spec(op_count, 100));
        let narrowed = parse(&generate_spec(op_count, 50));

        group.bench_with_input(
            BenchmarkId::new("identical", format!("{}_ops", op_count)),
            &old,
            |b, old| {
                b.iter(|| {
                    let result = engine.compare(black_box(old), "old", black_box(old), "new");
                    black_box(result.unwrap());
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("breaking", format!("{}_ops", op_count)),
            &(old, narrowed),
            |b, (old, new)| {
                b.iter(|| {
                    let result = engine.compare(black_box(old), "old", black_box(new), "new");
                    black_box(result.unwrap());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_compare);
criterion_main!(benches);
