use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use panelkit::compiler::{compile, RenderProps};
use panelkit::pipeline::compile_definition;
use panelkit::types::Size;
use serde_json::{json, Map};

const COUNTER: &str = r#"function Widget({ config, onConfigChange, size }) {
  const [count, setCount] = useState(Number(config.start) || 0);
  const label = useMemo(() => config.label + ": " + count, [count]);
  useEffect(() => {
    const id = count;
    return () => id;
  }, [count]);
  const rows = [1, 2, 3, 4, 5].map((n) => <li key={n}>{n * count}</li>);
  return (
    <div style={{ padding: 8, width: size.w * 10 }}>
      <h3>{label}</h3>
      <button onClick={() => setCount(count + 1)}>Add</button>
      <ul>{rows}</ul>
    </div>
  );
}"#;

fn reply() -> String {
    format!(
        "Here is a counter.\n```json\n{{\"id\": \"counter\", \"name\": \"Counter\"}}\n```\n```jsx\n{}\n```",
        COUNTER
    )
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    group.bench_function(BenchmarkId::from_parameter("source"), |b| {
        b.iter(|| compile(black_box(COUNTER)).is_ok());
    });
    let text = reply();
    group.bench_function(BenchmarkId::from_parameter("agent_reply"), |b| {
        b.iter(|| compile_definition(black_box(&text)).is_success());
    });
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let component = match compile(COUNTER) {
        Ok(component) => component,
        Err(err) => {
            eprintln!("skipping render bench: {err}");
            return;
        }
    };
    let mut config = Map::new();
    config.insert("start".into(), json!("3"));
    config.insert("label".into(), json!("Clicks"));
    let props = RenderProps::new(config, Size::new(4, 3));

    let mut group = c.benchmark_group("render");
    group.bench_function(BenchmarkId::from_parameter("counter"), |b| {
        b.iter(|| component.render_once(black_box(&props)).is_ok());
    });
    group.finish();
}

criterion_group!(benches, bench_compile, bench_render);
criterion_main!(benches);
